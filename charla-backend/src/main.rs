mod gateways;
mod stores;

use axum::{
    Router,
    extract::{Json, Path},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use charla_core::audio::{AudioCache, PrewarmOutcome};
use charla_core::games::{GameAssignment, assign_game_for_content_item, resolve_lesson_content};
use charla_core::generation::GenerationConfig;
use charla_core::pipeline::{ContentPipeline, GenerationRequest, IntegrityWarning};
use charla_core::session::GameSessionEngine;
use charla_core::stores::{LessonStore, ScenarioStore};
use charla_core::{
    CoreError, GameResult, GameSession, GenerationError, Language, Lesson, LessonPerformance,
    Scenario, SynthesisError, TtsRequest,
};

use gateways::{ElevenLabsClient, GeminiClient, SupabaseStorage};
use stores::Database;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // subject (user email)
    exp: usize,  // expiry
}

async fn verify_jwt(token: &str) -> Result<Claims, StatusCode> {
    let jwt_secret =
        std::env::var("SUPABASE_JWT_SECRET").map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_ref());

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(token_data.claims),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

fn database() -> Result<Database, StatusCode> {
    Database::from_env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn content_pipeline()
-> Result<ContentPipeline<GeminiClient, Database, Database, Database>, StatusCode> {
    let db = database()?;
    let gateway = GeminiClient::from_env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(ContentPipeline::new(
        gateway,
        GenerationConfig::default(),
        db.clone(),
        db.clone(),
        db,
    ))
}

fn audio_cache() -> Result<AudioCache<ElevenLabsClient, SupabaseStorage>, StatusCode> {
    let tts = ElevenLabsClient::from_env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let storage = SupabaseStorage::from_env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(AudioCache::new(tts, storage))
}

fn session_engine() -> Result<GameSessionEngine<Database, Database, Database>, StatusCode> {
    let db = database()?;
    Ok(GameSessionEngine::new(db.clone(), db.clone(), db))
}

/// Machine-readable failure mapping: rate limits are distinguishable from a
/// misconfigured or failing collaborator, client mistakes from server ones.
fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::SessionCompleted { .. } | CoreError::DuplicateResult { .. } => {
            StatusCode::CONFLICT
        }
        CoreError::Generation(GenerationError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
        CoreError::Generation(_) => StatusCode::BAD_GATEWAY,
        CoreError::Synthesis(SynthesisError::UnsupportedLanguage(_)) => {
            StatusCode::NOT_IMPLEMENTED
        }
        CoreError::Synthesis(_) => StatusCode::BAD_GATEWAY,
        CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct GeneratedCurriculum {
    scenario: Scenario,
    lessons: Vec<Lesson>,
}

async fn generate_scenario(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GeneratedCurriculum>, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let pipeline = content_pipeline()?;
    let mut rng = ChaCha8Rng::from_os_rng();
    let (scenario, lessons) = pipeline
        .generate_curriculum_and_lessons(&claims.sub, &request, &mut rng)
        .await
        .inspect_err(|e| log::error!("scenario generation failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(Json(GeneratedCurriculum { scenario, lessons }))
}

#[derive(Deserialize)]
struct ClarifyRequest {
    language: Language,
    purpose: String,
    user_input: String,
    #[serde(default)]
    previous_inputs: Vec<String>,
}

#[derive(Serialize)]
struct ClarifyResponse {
    reply: String,
}

async fn clarify(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ClarifyRequest>,
) -> Result<Json<ClarifyResponse>, StatusCode> {
    verify_jwt(auth.token()).await?;

    let pipeline = content_pipeline()?;
    let reply = pipeline
        .clarify(
            request.language,
            &request.purpose,
            &request.user_input,
            &request.previous_inputs,
        )
        .await
        .inspect_err(|e| log::error!("clarification failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(Json(ClarifyResponse { reply }))
}

#[derive(Serialize)]
struct AudioUrlResponse {
    url: String,
}

async fn audio_url(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<TtsRequest>,
) -> Result<Json<AudioUrlResponse>, StatusCode> {
    verify_jwt(auth.token()).await?;

    let cache = audio_cache()?;
    let url = cache
        .get_audio_url(&request.text, request.language)
        .await
        .inspect_err(|e| log::error!("audio fetch failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(Json(AudioUrlResponse { url }))
}

async fn prewarm_lesson(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(lesson_id): Path<String>,
) -> Result<Json<PrewarmOutcome>, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let db = database()?;
    let lesson = LessonStore::get(&db, &claims.sub, &lesson_id)
        .await
        .map_err(|e| {
            log::error!("lesson fetch failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    let scenario = ScenarioStore::get(&db, &claims.sub, &lesson.scenario_id)
        .await
        .map_err(|e| {
            log::error!("scenario fetch failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let content = resolve_lesson_content(&lesson, &scenario);
    let items: Vec<(String, Language)> = content
        .vocabulary
        .iter()
        .chain(content.sentences.iter())
        .map(|item| (item.text.clone(), item.language))
        .collect();

    let outcome = audio_cache()?.prewarm(items).await;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    lesson_id: String,
}

async fn create_session(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<GameSession>, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let engine = session_engine()?;
    let session = engine
        .create_session(&claims.sub, &request.lesson_id)
        .await
        .inspect_err(|e| log::error!("session creation failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(Json(session))
}

async fn submit_result(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(session_id): Path<String>,
    Json(result): Json<GameResult>,
) -> Result<StatusCode, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let engine = session_engine()?;
    engine
        .submit_result(&session_id, &claims.sub, result)
        .await
        .inspect_err(|e| log::error!("result submission failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn complete_session(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(session_id): Path<String>,
) -> Result<Json<LessonPerformance>, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let engine = session_engine()?;
    let summary = engine
        .complete_session(&session_id, &claims.sub)
        .await
        .inspect_err(|e| log::error!("session completion failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(Json(summary))
}

#[derive(Deserialize)]
struct SelectGameRequest {
    lesson_id: String,
    content_hash: String,
}

async fn select_game(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<SelectGameRequest>,
) -> Result<Json<GameAssignment>, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let db = database()?;
    let lesson = LessonStore::get(&db, &claims.sub, &request.lesson_id)
        .await
        .map_err(|e| {
            log::error!("lesson fetch failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    let scenario = ScenarioStore::get(&db, &claims.sub, &lesson.scenario_id)
        .await
        .map_err(|e| {
            log::error!("scenario fetch failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let mut rng = ChaCha8Rng::from_os_rng();
    let assignment =
        assign_game_for_content_item(&lesson, &scenario, &request.content_hash, &mut rng)
            .inspect_err(|e| log::error!("game assignment failed: {e}"))
            .map_err(|e| status_for(&e))?;

    Ok(Json(assignment))
}

async fn scenario_integrity(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(scenario_id): Path<String>,
) -> Result<Json<Vec<IntegrityWarning>>, StatusCode> {
    let claims = verify_jwt(auth.token()).await?;

    let pipeline = content_pipeline()?;
    let warnings = pipeline
        .sweep(&claims.sub, &scenario_id)
        .await
        .inspect_err(|e| log::error!("integrity sweep failed: {e}"))
        .map_err(|e| status_for(&e))?;

    Ok(Json(warnings))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Hello from charla!" }))
        .route("/scenarios/generate", post(generate_scenario))
        .route("/scenarios/{id}/integrity", get(scenario_integrity))
        .route("/clarify", post(clarify))
        .route("/audio", post(audio_url))
        .route("/lessons/{id}/prewarm", post(prewarm_lesson))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/results", post(submit_result))
        .route("/sessions/{id}/complete", post(complete_session))
        .route("/games/select", post(select_game))
        .layer(CompressionLayer::new())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
    log::info!("listening on port 8080");
    axum::serve(listener, app).await.unwrap();
}

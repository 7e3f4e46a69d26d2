use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use narration_backend::controllers::{jobs::JobController, keys::KeyController};
use narration_backend::domain::audio::{AudioAssembler, AudioTranscoder, Mp3Transcoder};
use narration_backend::domain::jobs::{JobScheduler, NarrationDefaults, NarrationService, SchedulerSettings};
use narration_backend::domain::keys::{KeyPool, KeyService};
use narration_backend::domain::shared::{Clock, SystemClock};
use narration_backend::domain::text::{LanguageResolver, TextCleaner};
use narration_backend::infrastructure::config::{Config, LogFormat};
use narration_backend::infrastructure::http::start_http_server;
use narration_backend::infrastructure::repositories::{
    ChunkSynthesizer, GeminiTtsRepository, JsonFileKeyRepository, KeyRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting Narration Backend on {}:{}",
        config.host,
        config.port
    );
    tracing::info!(
        environment = ?config.environment,
        model = %config.default_tts_model,
        max_concurrent_jobs = config.max_concurrent_jobs,
        max_chunk_attempts = config.max_chunk_attempts,
        chunk_cache_enabled = config.chunk_cache_enabled,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories
    tracing::info!("Instantiating repositories...");
    let key_repo: Arc<dyn KeyRepository> = Arc::new(JsonFileKeyRepository::new(&config.keys_file));
    let synthesizer: Arc<dyn ChunkSynthesizer> = Arc::new(GeminiTtsRepository::new(
        config.gemini_api_base.clone(),
        config.synthesis_timeout(),
    )?);

    // 2. Load the key pool
    let keys = key_repo.load().await?;
    let pool = Arc::new(KeyPool::new(
        keys,
        clock.clone(),
        config.allow_invalid_key_fallback,
    ));

    // 3. Instantiate services
    tracing::info!("Instantiating services...");
    let key_service = Arc::new(KeyService::new(
        pool.clone(),
        synthesizer.clone(),
        key_repo.clone(),
        clock.clone(),
        config.default_tts_model.clone(),
    ));
    let seeded = key_service.seed_secrets(&config.gemini_api_keys);
    if seeded > 0 {
        tracing::info!(seeded, "Keys seeded from environment");
        key_service.persist().await?;
    }
    if pool.is_empty() {
        tracing::warn!("Key pool is empty. Add keys through POST /api/keys or GEMINI_API_KEYS");
    }

    let transcoder: Arc<dyn AudioTranscoder> = Arc::new(Mp3Transcoder);
    let scheduler = Arc::new(JobScheduler::new(
        pool.clone(),
        synthesizer,
        AudioAssembler::new(config.normalize_loudness),
        Some(transcoder),
        clock,
        SchedulerSettings {
            max_concurrent_jobs: config.max_concurrent_jobs,
            max_chunk_attempts: config.max_chunk_attempts,
            key_wait_timeout: config.key_wait_timeout(),
            chunk_cache_enabled: config.chunk_cache_enabled,
        },
    ));
    let narration_service = Arc::new(NarrationService::new(
        scheduler.clone(),
        TextCleaner::new()?,
        LanguageResolver::new(),
        NarrationDefaults {
            model: config.default_tts_model.clone(),
            voice: config.default_voice.clone(),
        },
    ));

    // Persist key counters and demotions whenever a job finishes
    tokio::spawn(key_service.clone().persist_on_job_events(scheduler.subscribe()));

    // 4. Instantiate controllers
    tracing::info!("Instantiating controllers...");
    let job_controller = Arc::new(JobController::new(narration_service));
    let key_controller = Arc::new(KeyController::new(key_service));

    // Start HTTP server with all routes
    start_http_server(config, pool, job_controller, key_controller).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "narration_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "narration_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

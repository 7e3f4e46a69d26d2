use narration_backend::controllers::{jobs::JobController, keys::KeyController};
use narration_backend::domain::audio::{AudioAssembler, AudioTranscoder, Mp3Transcoder};
use narration_backend::domain::jobs::{
    JobScheduler, NarrationDefaults, NarrationService, SchedulerSettings,
};
use narration_backend::domain::keys::{KeyPool, KeyService};
use narration_backend::domain::shared::{Clock, SystemClock};
use narration_backend::domain::text::{LanguageResolver, TextCleaner};
use narration_backend::infrastructure::http::build_router;
use narration_backend::infrastructure::repositories::{InMemoryKeyRepository, KeyRepository};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;

pub mod api_client;
pub mod fixtures;

use api_client::TestClient;
use fixtures::{valid_key, ScriptedSynthesizer};

pub const TEST_SECRET: &str = "AIza-test-key-0001";

pub struct TestContext {
    pub client: TestClient,
    pub synthesizer: Arc<ScriptedSynthesizer>,
    pub repository: Arc<InMemoryKeyRepository>,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let synthesizer = Arc::new(ScriptedSynthesizer::default());
            let repository = Arc::new(InMemoryKeyRepository::default());

            // One proven key; every test stays under the narration model's per-minute limit
            let pool = Arc::new(KeyPool::new(
                vec![valid_key(TEST_SECRET, "primary")],
                clock.clone(),
                false,
            ));

            let key_service = Arc::new(KeyService::new(
                pool.clone(),
                synthesizer.clone(),
                repository.clone(),
                clock.clone(),
                "gemini-2.0-flash-lite".to_string(),
            ));

            let transcoder: Arc<dyn AudioTranscoder> = Arc::new(Mp3Transcoder);
            let scheduler = Arc::new(JobScheduler::new(
                pool.clone(),
                synthesizer.clone(),
                AudioAssembler::new(false),
                Some(transcoder),
                clock,
                SchedulerSettings {
                    max_concurrent_jobs: 2,
                    max_chunk_attempts: 3,
                    key_wait_timeout: Duration::from_secs(2),
                    chunk_cache_enabled: false,
                },
            ));
            let narration_service = Arc::new(NarrationService::new(
                scheduler,
                TextCleaner::new().expect("Failed to build text cleaner"),
                LanguageResolver::new(),
                NarrationDefaults {
                    model: "gemini-2.5-flash-preview-tts".to_string(),
                    voice: "Kore".to_string(),
                },
            ));

            let app = build_router(
                pool,
                Arc::new(JobController::new(narration_service)),
                Arc::new(KeyController::new(key_service)),
            );

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            // Wait for server to be ready
            tokio::time::sleep(Duration::from_millis(50)).await;

            Self {
                client: TestClient::new(&base_url),
                synthesizer,
                repository,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

impl TestContext {
    /// Polls a job until it reaches a terminal status and returns its detail view.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        for _ in 0..250 {
            let response = self.client.get(&format!("/api/jobs/{}", job_id)).await.unwrap();
            let body = response.body.clone().expect("Missing job body");
            let status = body["status"].as_str().unwrap_or_default().to_string();
            if matches!(status.as_str(), "done" | "error" | "cancelled") {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Job {} did not finish in time", job_id);
    }

    pub async fn stored_key_count(&self) -> usize {
        self.repository.load().await.unwrap().len()
    }
}

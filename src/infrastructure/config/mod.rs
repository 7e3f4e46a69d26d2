use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Key storage
    pub keys_file: String,
    pub gemini_api_keys: Vec<String>,
    // Speech provider
    pub gemini_api_base: String,
    pub default_tts_model: String,
    pub default_voice: String,
    pub synthesis_timeout_secs: u64,
    // Scheduling
    pub max_concurrent_jobs: usize,
    pub max_chunk_attempts: u32,
    pub key_wait_timeout_secs: u64,
    pub allow_invalid_key_fallback: bool,
    // Chunk cache
    pub chunk_cache_enabled: bool,
    // Assembly
    pub normalize_loudness: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            environment: match env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .as_str()
            {
                "production" => Environment::Production,
                _ => Environment::Development,
            },
            log_format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            keys_file: env::var("KEYS_FILE").unwrap_or_else(|_| "data/keys.json".to_string()),
            gemini_api_keys: parse_list(&env::var("GEMINI_API_KEYS").unwrap_or_default()),
            gemini_api_base: env::var("GEMINI_API_BASE").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            default_tts_model: env::var("DEFAULT_TTS_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".to_string()),
            default_voice: env::var("DEFAULT_VOICE").unwrap_or_else(|_| "Kore".to_string()),
            synthesis_timeout_secs: env::var("SYNTHESIS_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            max_chunk_attempts: env::var("MAX_CHUNK_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            key_wait_timeout_secs: env::var("KEY_WAIT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            allow_invalid_key_fallback: parse_flag("ALLOW_INVALID_KEY_FALLBACK", true),
            chunk_cache_enabled: parse_flag("CHUNK_CACHE_ENABLED", false),
            normalize_loudness: parse_flag("NORMALIZE_LOUDNESS", true),
        };

        Ok(config)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn key_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.key_wait_timeout_secs)
    }
}

fn parse_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| s.trim().eq_ignore_ascii_case("true") || s.trim() == "1")
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::synthesizer::{ChunkRequest, ChunkSynthesizer};
use crate::domain::audio::pcm16_to_wav;
use crate::domain::jobs::SynthesisError;
use crate::domain::keys::KeyLease;

const API_KEY_HEADER: &str = "x-goog-api-key";
/// Sample rate the provider uses when the mime type does not say.
const DEFAULT_SAMPLE_RATE: u32 = 24000;
/// Longest slice of an error body kept in messages.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'a str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(rename = "@type", default)]
    kind: String,
    retry_delay: Option<String>,
    reason: Option<String>,
}

impl ErrorBody {
    /// Quota throttling: RESOURCE_EXHAUSTED or QuotaFailure/RetryInfo details.
    fn is_quota_throttle(&self) -> bool {
        self.status == "RESOURCE_EXHAUSTED"
            || self.details.iter().any(|detail| {
                detail.kind.ends_with("google.rpc.QuotaFailure")
                    || detail.kind.ends_with("google.rpc.RetryInfo")
            })
    }

    fn retry_delay(&self) -> Option<Duration> {
        self.details
            .iter()
            .find_map(|detail| detail.retry_delay.as_deref())
            .and_then(parse_retry_delay)
    }
}

/// Gemini speech-generation client
pub struct GeminiTtsRepository {
    http_client: reqwest::Client,
    api_base: String,
}

impl GeminiTtsRepository {
    pub fn new(api_base: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn error_from_response(response: reqwest::Response) -> SynthesisError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body, retry_after)
    }
}

#[async_trait]
impl ChunkSynthesizer for GeminiTtsRepository {
    async fn synthesize(
        &self,
        key: &KeyLease,
        request: &ChunkRequest<'_>,
    ) -> Result<Vec<u8>, SynthesisError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, request.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart { text: request.text }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: request.voice,
                        },
                    },
                    language_code: request.language,
                },
            },
        };

        tracing::debug!(
            job_id = %request.job_id,
            chunk_index = request.chunk_index,
            model = %request.model,
            voice = %request.voice,
            text_length = request.text.len(),
            "Calling speech provider"
        );

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &key.secret)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::NoContent(format!("unreadable response: {}", e)))?;

        let inline = payload
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .ok_or_else(|| SynthesisError::NoContent("response has no audio part".to_string()))?;

        let pcm = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| SynthesisError::NoContent(format!("audio is not valid base64: {}", e)))?;
        if pcm.is_empty() {
            return Err(SynthesisError::NoContent("audio part is empty".to_string()));
        }

        let sample_rate = sample_rate_from_mime(&inline.mime_type).unwrap_or(DEFAULT_SAMPLE_RATE);
        pcm16_to_wav(&pcm, sample_rate, 1).map_err(|e| SynthesisError::NoContent(e.to_string()))
    }

    async fn validate_key(&self, key: &KeyLease) -> Result<(), SynthesisError> {
        let url = format!("{}/models/{}", self.api_base, key.model);
        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, &key.secret)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }
}

fn transport_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::Timeout(e.without_url().to_string())
    } else {
        SynthesisError::Network(e.without_url().to_string())
    }
}

/// Maps a non-success provider response onto the synthesis error taxonomy.
fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> SynthesisError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|envelope| envelope.error.message.clone())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| truncate(body));
    let lower = body.to_lowercase();
    let mentions_billing = lower.contains("billing") || lower.contains("credit");
    let error_body = parsed.as_ref().map(|envelope| &envelope.error);
    let quota_throttle = error_body.map_or(false, ErrorBody::is_quota_throttle);

    match status {
        400 if lower.contains("api key not valid") || lower.contains("api_key_invalid") => {
            SynthesisError::KeyInvalid(message)
        }
        400 => SynthesisError::InvalidRequest(message),
        401 => SynthesisError::KeyInvalid(message),
        402 => SynthesisError::KeyNoCredits(message),
        403 if mentions_billing => SynthesisError::KeyNoCredits(message),
        403 => SynthesisError::KeySuspended(message),
        429 if !quota_throttle && billing_disabled(&lower, error_body) => {
            SynthesisError::KeyNoCredits(message)
        }
        429 => SynthesisError::RateLimited {
            retry_after: error_body.and_then(ErrorBody::retry_delay).or(retry_after),
            message,
        },
        500..=599 => SynthesisError::Server {
            status,
            message,
            retry_after,
        },
        _ => SynthesisError::InvalidRequest(format!("unexpected status {}: {}", status, message)),
    }
}

/// An explicit statement that the key's billing is off, as opposed to a quota message
/// that merely points at billing details.
fn billing_disabled(lower: &str, error_body: Option<&ErrorBody>) -> bool {
    let reason = error_body.map_or(false, |body| {
        body.details
            .iter()
            .filter_map(|detail| detail.reason.as_deref())
            .any(|reason| reason == "BILLING_DISABLED")
    });
    reason
        || lower.contains("billing_disabled")
        || (lower.contains("billing") && (lower.contains("disabled") || lower.contains("not enabled")))
        || lower.contains("insufficient credit")
        || lower.contains("out of credit")
}

/// Parses protobuf duration strings such as "49s" or "1.5s".
fn parse_retry_delay(raw: &str) -> Option<Duration> {
    let seconds: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

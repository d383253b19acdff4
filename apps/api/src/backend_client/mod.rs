/// Backend Client: the single point of entry for calls to the recommendations
/// backend (progress storage, quiz scoring, personalized recommendations).
///
/// The backend owns the recommendation algorithm and the personality
/// profiling; this module only speaks its HTTP contract.
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::identity::Identity;
use crate::models::recommendations::BackendRecommendationsResponse;
use crate::models::session::{AssessmentSession, Preferences, ProgressPayload, SkillSelection};

pub mod legacy;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Backend unavailable after {retries} retries")]
    Unavailable { retries: u32 },

    #[error("Backend rejected the credentials")]
    Unauthorized,
}

/// Body of `POST /quiz`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizSubmission {
    pub answers: BTreeMap<String, u8>,
    pub skills: BTreeMap<String, SkillSelection>,
    pub preferences: Preferences,
}

impl QuizSubmission {
    /// Only selected skills are sent.
    pub fn from_session(session: &AssessmentSession) -> Self {
        Self {
            answers: session.personality.clone(),
            skills: session
                .skills
                .iter()
                .filter(|(_, s)| s.selected)
                .map(|(name, s)| (name.clone(), s.clone()))
                .collect(),
            preferences: session.preferences.clone(),
        }
    }
}

/// Response of `GET /progress`. `data` stays untyped so restore can overlay it
/// field by field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProgress {
    #[serde(default)]
    pub current_step: Option<i64>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub answers: Option<BTreeMap<String, u8>>,
}

/// The backend contract. `BackendClient` speaks it over HTTP; tests substitute
/// in-memory doubles.
#[async_trait]
pub trait AssessmentBackend: Send + Sync {
    /// `Ok(None)` when the user has no stored progress.
    async fn load_progress(&self, identity: &Identity)
        -> Result<Option<ServerProgress>, BackendError>;

    async fn save_progress(
        &self,
        identity: &Identity,
        payload: &ProgressPayload,
    ) -> Result<(), BackendError>;

    async fn clear_progress(&self, identity: &Identity) -> Result<(), BackendError>;

    async fn submit_quiz(
        &self,
        identity: &Identity,
        submission: &QuizSubmission,
    ) -> Result<BackendRecommendationsResponse, BackendError>;

    async fn personalized_recommendations(
        &self,
        identity: &Identity,
    ) -> Result<BackendRecommendationsResponse, BackendError>;
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends one request, retrying 429 and 5xx with exponential backoff.
    /// Returns `Ok(None)` for 404 and for empty bodies.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        identity: &Identity,
        body: Option<&Value>,
    ) -> Result<Option<String>, BackendError> {
        let url = self.url(path);
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 500ms, 1s, 2s
                let delay = Duration::from_millis(BACKOFF_BASE_MS * (1 << (attempt - 1)));
                warn!(
                    "{method} {path} attempt {attempt} failed, retrying after {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&identity.token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(BackendError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Backend returned {status} for {method} {path}: {body}");
                last_error = Some(BackendError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(BackendError::Unauthorized);
            }

            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Api {
                    status: status.as_u16(),
                    message: extract_error_message(&body),
                });
            }

            let text = response.text().await?;
            debug!("{method} {path} -> {status} ({} bytes)", text.len());
            return Ok(Some(text).filter(|t| !t.trim().is_empty()));
        }

        Err(last_error.unwrap_or(BackendError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl AssessmentBackend for BackendClient {
    async fn load_progress(
        &self,
        identity: &Identity,
    ) -> Result<Option<ServerProgress>, BackendError> {
        match self.execute(Method::GET, "/progress", identity, None).await? {
            Some(body) => Ok(parse_progress(&body)?),
            None => Ok(None),
        }
    }

    async fn save_progress(
        &self,
        identity: &Identity,
        payload: &ProgressPayload,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_value(payload)?;
        self.execute(Method::POST, "/progress", identity, Some(&body))
            .await?;
        Ok(())
    }

    async fn clear_progress(&self, identity: &Identity) -> Result<(), BackendError> {
        self.execute(Method::DELETE, "/progress", identity, None)
            .await?;
        Ok(())
    }

    async fn submit_quiz(
        &self,
        identity: &Identity,
        submission: &QuizSubmission,
    ) -> Result<BackendRecommendationsResponse, BackendError> {
        let body = serde_json::to_value(submission)?;
        let text = self
            .execute(Method::POST, "/quiz", identity, Some(&body))
            .await?
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: "quiz endpoint returned no recommendations".to_string(),
            })?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn personalized_recommendations(
        &self,
        identity: &Identity,
    ) -> Result<BackendRecommendationsResponse, BackendError> {
        let text = self
            .execute(
                Method::GET,
                "/recommendations/personalized",
                identity,
                None,
            )
            .await?
            .unwrap_or_else(|| "{}".to_string());
        let value: Value = serde_json::from_str(&text)?;
        Ok(legacy::normalize_personalized(value)?)
    }
}

/// The progress endpoint answers `null` or `{}` when nothing is stored.
fn parse_progress(body: &str) -> Result<Option<ServerProgress>, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    match value {
        Value::Null => Ok(None),
        Value::Object(ref map) if map.is_empty() => Ok(None),
        other => Ok(Some(serde_json::from_value(other)?)),
    }
}

/// Pulls `message` or `error` out of a JSON error body, else returns the body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

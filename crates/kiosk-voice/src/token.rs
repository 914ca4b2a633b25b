//! Short-lived speech provider tokens issued by the backend.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Tokens with less than this lifetime left are refreshed before use.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Upper bound on an advertised token lifetime.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechToken {
    pub token: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(alias = "expires_in_sec", alias = "expiresIn")]
    pub expires_in_sec: u64,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> VoiceResult<SpeechToken>;
}

/// `GET {base}/api/speech/token`.
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    url: String,
    client: reqwest::Client,
}

impl HttpTokenSource {
    pub fn new(base_url: &str, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Token(e.to_string()))?;
        Ok(Self {
            url: format!("{}/api/speech/token", base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(&self) -> VoiceResult<SpeechToken> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| VoiceError::Token(e.to_string()))?;
        if !res.status().is_success() {
            return Err(VoiceError::Token(format!("token endpoint returned {}", res.status())));
        }
        let token: SpeechToken = res.json().await.map_err(|e| VoiceError::Token(e.to_string()))?;
        if token.token.trim().is_empty() {
            return Err(VoiceError::Token("token endpoint returned an empty token".into()));
        }
        Ok(token)
    }
}

struct Cached {
    token: SpeechToken,
    expires_at: Instant,
}

/// Caches one token and refreshes it inside [`REFRESH_MARGIN`] of expiry.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    margin: Duration,
    cached: Mutex<Option<Cached>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_margin(source, REFRESH_MARGIN)
    }

    pub fn with_margin(source: Arc<dyn TokenSource>, margin: Duration) -> Self {
        Self {
            source,
            margin,
            cached: Mutex::new(None),
        }
    }

    /// A token with more than the margin left, fetching a new one if needed.
    pub async fn get(&self) -> VoiceResult<SpeechToken> {
        let mut cached = self.cached.lock().await;
        let now = Instant::now();
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at.saturating_duration_since(now) > self.margin {
                return Ok(entry.token.clone());
            }
            debug!("speech token inside refresh margin");
        }
        let token = self.source.fetch().await?;
        info!("🔑 speech token refreshed ({}s)", token.expires_in_sec);
        let lifetime = Duration::from_secs(token.expires_in_sec).min(MAX_TOKEN_LIFETIME);
        *cached = Some(Cached {
            expires_at: now + lifetime,
            token: token.clone(),
        });
        Ok(token)
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

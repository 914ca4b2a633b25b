//! Dialogue client: one request/response call to the remote ordering agent.
//!
//! There is no retry, caching, or deduplication. The agent holds all
//! conversational memory for a session id; every utterance is its own turn.
//! Failures never escape as errors, they come back as [`DialogueOutcome::Unreachable`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Optional preference record forwarded with each turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diseases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dislikes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTurnRequest {
    pub session_id: String,
    pub message: String,
    pub store: String,
    #[serde(default)]
    pub selected_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

/// Fields the agent may use for its reply text, in preference order.
pub const REPLY_FIELDS: &[&str] = &["speak", "reply", "message", "text"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentTurnResponse {
    pub speak: String,
    pub stage: String,
    /// Raw action objects; parsed one by one by the dispatcher.
    pub actions: Vec<Value>,
    pub total_amount: Option<i64>,
}

impl AgentTurnResponse {
    /// Build from an arbitrary JSON body, tolerating the reply-field aliases
    /// and a missing or non-list `actions`.
    pub fn from_value(body: &Value) -> Self {
        let speak = REPLY_FIELDS
            .iter()
            .filter_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|text| !text.is_empty())
            .unwrap_or("")
            .to_string();
        let stage = body
            .get("stage")
            .or_else(|| body.get("state").and_then(|s| s.get("stage")))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let actions = body
            .get("actions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total_amount = body.get("total_amount").and_then(Value::as_i64);
        Self {
            speak,
            stage,
            actions,
            total_amount,
        }
    }

    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }
}

impl<'de> Deserialize<'de> for AgentTurnResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let body = Value::deserialize(deserializer)?;
        if !body.is_object() {
            return Err(serde::de::Error::custom("agent response must be a JSON object"));
        }
        Ok(Self::from_value(&body))
    }
}

/// Result of one dialogue call.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueOutcome {
    Reply(AgentTurnResponse),
    /// Network failure, timeout, non-success status, or an undecodable body.
    Unreachable(String),
}

#[async_trait]
pub trait DialogueClient: Send + Sync {
    async fn send(&self, request: &AgentTurnRequest) -> DialogueOutcome;
}

/// JSON-over-HTTP dialogue client.
#[derive(Debug, Clone)]
pub struct HttpDialogueClient {
    url: String,
    client: reqwest::Client,
}

impl HttpDialogueClient {
    /// `timeout` bounds the whole round trip; a timed-out call is `Unreachable`.
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DialogueClient for HttpDialogueClient {
    async fn send(&self, request: &AgentTurnRequest) -> DialogueOutcome {
        debug!("dialogue → {} ({} chars)", self.url, request.message.chars().count());
        let res = match self.client.post(&self.url).json(request).send().await {
            Ok(res) => res,
            Err(e) => {
                warn!("dialogue unreachable: {}", e);
                return DialogueOutcome::Unreachable(e.to_string());
            }
        };
        let status = res.status();
        if !status.is_success() {
            warn!("dialogue returned {}", status);
            return DialogueOutcome::Unreachable(format!("status {}", status.as_u16()));
        }
        match res.json::<AgentTurnResponse>().await {
            Ok(reply) => {
                debug!("dialogue ← stage={:?} actions={}", reply.stage, reply.actions.len());
                DialogueOutcome::Reply(reply)
            }
            Err(e) => {
                warn!("dialogue body undecodable: {}", e);
                DialogueOutcome::Unreachable(e.to_string())
            }
        }
    }
}

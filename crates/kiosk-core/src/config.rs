//! Kiosk configuration.
//!
//! Loaded with the `config` crate: built-in defaults, then an optional TOML
//! file (`KIOSK_CONFIG`, default `config/kiosk.toml`), then environment
//! variables with prefix `KIOSK` and separator `__`
//! (e.g. `KIOSK__BACKEND_BASE_URL`, `KIOSK__SPEECH__KEY`).

use crate::error::{KioskError, KioskResult};
use crate::screen::ScreenState;
use crate::shortcut::ShortcutConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/kiosk.toml";
pub const DEFAULT_STORE: &str = "옥소반 마곡본점";
pub const DEFAULT_DIALOGUE_TIMEOUT_MS: u64 = 15_000;

/// Speech provider credentials. Either `region` or `endpoint` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechCredentials {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl SpeechCredentials {
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Fixed phrases spoken by the kiosk itself (never by the agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrases {
    pub apology: String,
    pub order_complete: String,
    pub order_failed: String,
    pub empty_cart: String,
    pub follow_up_intro: String,
    pub follow_up_menu: String,
    pub follow_up_confirm: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            apology: "죄송해요, 지금은 주문 도우미와 연결할 수 없어요. 잠시 후 다시 말씀해 주세요.".into(),
            order_complete: "주문이 완료되었어요. 감사합니다!".into(),
            order_failed: "결제에 실패했어요. 다시 한 번 시도해 주세요.".into(),
            empty_cart: "장바구니가 비어 있어요.".into(),
            follow_up_intro: "주문하시려면 '주문'이라고 말씀해 주세요.".into(),
            follow_up_menu: "어떤 메뉴를 원하세요? 메뉴 이름과 수량을 말씀해 주세요.".into(),
            follow_up_confirm: "이대로 주문할까요? '주문'이라고 말씀해 주시면 결제를 진행할게요.".into(),
        }
    }
}

impl Phrases {
    /// Follow-up prompt for the given screen. Nothing is prompted once the order is done.
    pub fn follow_up_for(&self, screen: ScreenState) -> Option<&str> {
        let phrase = match screen {
            ScreenState::Intro => &self.follow_up_intro,
            ScreenState::Menu => &self.follow_up_menu,
            ScreenState::Confirm => &self.follow_up_confirm,
            ScreenState::Done => return None,
        };
        Some(phrase.as_str()).filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskConfig {
    pub backend_base_url: String,
    pub store: String,
    pub language: String,
    pub dialogue_path: String,
    pub dialogue_timeout_ms: u64,
    #[serde(default)]
    pub speech: SpeechCredentials,
    #[serde(default)]
    pub shortcuts: ShortcutConfig,
    #[serde(default)]
    pub phrases: Phrases,
    pub follow_up_enabled: bool,
    /// External TTS program; the text is passed as the last argument.
    #[serde(default)]
    pub voice_command: Option<String>,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            backend_base_url: String::new(),
            store: DEFAULT_STORE.to_string(),
            language: "ko-KR".to_string(),
            dialogue_path: "/agent/chat".to_string(),
            dialogue_timeout_ms: DEFAULT_DIALOGUE_TIMEOUT_MS,
            speech: SpeechCredentials::default(),
            shortcuts: ShortcutConfig::default(),
            phrases: Phrases::default(),
            follow_up_enabled: true,
            voice_command: None,
        }
    }
}

impl KioskConfig {
    /// Load from defaults, the optional config file, and the environment.
    pub fn load() -> KioskResult<Self> {
        let path = std::env::var("KIOSK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> KioskResult<Self> {
        let builder = config::Config::builder()
            .set_default("backend_base_url", "")?
            .set_default("store", DEFAULT_STORE)?
            .set_default("language", "ko-KR")?
            .set_default("dialogue_path", "/agent/chat")?
            .set_default("dialogue_timeout_ms", DEFAULT_DIALOGUE_TIMEOUT_MS as i64)?
            .set_default("follow_up_enabled", true)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("KIOSK").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }

    pub fn dialogue_timeout(&self) -> Duration {
        Duration::from_millis(self.dialogue_timeout_ms)
    }

    pub fn backend_url(&self) -> &str {
        self.backend_base_url.trim().trim_end_matches('/')
    }

    /// Everything the kiosk needs: backend plus speech credentials.
    pub fn validate(&self) -> KioskResult<()> {
        self.validate_backend()?;
        self.validate_speech()
    }

    /// Backend reachability settings only; enough for text-driven sessions.
    pub fn validate_backend(&self) -> KioskResult<()> {
        let url = self.backend_url();
        if url.is_empty() {
            return Err(KioskError::Config("backend_base_url is not set".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(KioskError::Config(format!(
                "backend_base_url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if self.dialogue_timeout_ms == 0 {
            return Err(KioskError::Config("dialogue_timeout_ms must be positive".into()));
        }
        if self.store.trim().is_empty() {
            return Err(KioskError::Config("store is not set".into()));
        }
        Ok(())
    }

    pub fn validate_speech(&self) -> KioskResult<()> {
        if self.speech.key.trim().is_empty() {
            return Err(KioskError::Config("speech.key is not set".into()));
        }
        if self.speech.region().is_none() && self.speech.endpoint().is_none() {
            return Err(KioskError::Config(
                "speech.region or speech.endpoint must be set".into(),
            ));
        }
        Ok(())
    }
}

//! Local keyword shortcuts evaluated on the raw transcript before any network call.
//!
//! Keyword sets are data, so storefront variants differ only in configuration.

use crate::menu::normalize_name;
use crate::screen::{ScreenState, ScreenStateMachine};
use serde::{Deserialize, Serialize};

/// What a shortcut asks the kiosk to do locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIntent {
    /// "멈춰" / "중지": end the listening session after this utterance.
    StopListening,
    /// "주문" while on the intro screen: open the menu.
    OpenMenu,
    /// "다음": advance one screen.
    NextScreen,
    /// "처음으로": back to the intro screen.
    GoHome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutConfig {
    #[serde(default = "default_stop_keywords")]
    pub stop: Vec<String>,
    #[serde(default = "default_menu_keywords")]
    pub menu: Vec<String>,
    #[serde(default = "default_next_keywords")]
    pub next: Vec<String>,
    #[serde(default = "default_home_keywords")]
    pub home: Vec<String>,
}

fn default_stop_keywords() -> Vec<String> {
    vec!["멈춰".into(), "중지".into(), "스탑".into()]
}

fn default_menu_keywords() -> Vec<String> {
    vec!["주문".into(), "메뉴".into()]
}

fn default_next_keywords() -> Vec<String> {
    vec!["다음".into()]
}

fn default_home_keywords() -> Vec<String> {
    vec!["처음으로".into()]
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            stop: default_stop_keywords(),
            menu: default_menu_keywords(),
            next: default_next_keywords(),
            home: default_home_keywords(),
        }
    }
}

/// Result of evaluating shortcuts for one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutOutcome {
    pub intents: Vec<LocalIntent>,
    /// True when a shortcut moved the screen, i.e. the turn was satisfied locally.
    pub screen_changed: bool,
}

impl ShortcutOutcome {
    pub fn contains(&self, intent: LocalIntent) -> bool {
        self.intents.contains(&intent)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShortcutMatcher {
    config: ShortcutConfig,
}

impl ShortcutMatcher {
    pub fn new(config: ShortcutConfig) -> Self {
        Self { config }
    }

    /// Which intents the transcript carries, given the current screen.
    ///
    /// Matching is on the whitespace-stripped, lowercased transcript so that
    /// "주문 할게요" and "주문할게요" behave the same.
    pub fn detect(&self, transcript: &str, screen: ScreenState) -> Vec<LocalIntent> {
        let text = normalize_name(transcript);
        if text.is_empty() {
            return Vec::new();
        }
        let hit = |words: &[String]| {
            words
                .iter()
                .map(|w| normalize_name(w))
                .any(|w| !w.is_empty() && text.contains(&w))
        };

        let mut intents = Vec::new();
        if hit(&self.config.stop) {
            intents.push(LocalIntent::StopListening);
        }
        if hit(&self.config.home) {
            intents.push(LocalIntent::GoHome);
        } else if screen == ScreenState::Intro && hit(&self.config.menu) {
            intents.push(LocalIntent::OpenMenu);
        } else if hit(&self.config.next) {
            intents.push(LocalIntent::NextScreen);
        }
        intents
    }

    /// Detect and apply screen shortcuts. `StopListening` is reported but left
    /// to the caller, which owns the speech session.
    pub fn apply(&self, transcript: &str, screen: &mut ScreenStateMachine) -> ShortcutOutcome {
        if screen.is_done() {
            return ShortcutOutcome::default();
        }
        let intents = self.detect(transcript, screen.current());
        let mut screen_changed = false;
        for intent in &intents {
            screen_changed |= match intent {
                LocalIntent::OpenMenu => screen.transition(ScreenState::Menu),
                LocalIntent::NextScreen => screen.advance(),
                LocalIntent::GoHome => screen.transition(ScreenState::Intro),
                LocalIntent::StopListening => false,
            };
        }
        ShortcutOutcome {
            intents,
            screen_changed,
        }
    }
}

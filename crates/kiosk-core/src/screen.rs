//! Conversational screen state machine: Intro → Menu → Confirm → Done.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenState {
    Intro,
    Menu,
    Confirm,
    /// Terminal for a completed order. A fresh session restarts at `Intro`.
    Done,
}

impl ScreenState {
    /// Map an agent `NAVIGATE` target: "home" is the intro screen, anything
    /// else non-empty lands on the menu. Empty targets map to nothing.
    pub fn from_target(target: &str) -> Option<Self> {
        let target = target.trim();
        if target.is_empty() {
            None
        } else if target.eq_ignore_ascii_case("home") {
            Some(ScreenState::Intro)
        } else {
            Some(ScreenState::Menu)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenState::Intro => "intro",
            ScreenState::Menu => "menu",
            ScreenState::Confirm => "confirm",
            ScreenState::Done => "done",
        }
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenStateMachine {
    state: ScreenState,
}

impl Default for ScreenStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenStateMachine {
    pub fn new() -> Self {
        Self {
            state: ScreenState::Intro,
        }
    }

    pub fn current(&self) -> ScreenState {
        self.state
    }

    /// Move to `to`. Re-entering the current state is a no-op; returns whether
    /// the state actually changed.
    pub fn transition(&mut self, to: ScreenState) -> bool {
        if self.state == to {
            return false;
        }
        debug!("screen: {} -> {}", self.state, to);
        self.state = to;
        true
    }

    /// Step forward one screen, stopping at `Confirm`. `Done` is only reached
    /// through order completion.
    pub fn advance(&mut self) -> bool {
        let next = match self.state {
            ScreenState::Intro => ScreenState::Menu,
            ScreenState::Menu | ScreenState::Confirm => ScreenState::Confirm,
            ScreenState::Done => ScreenState::Done,
        };
        self.transition(next)
    }

    pub fn is_done(&self) -> bool {
        self.state == ScreenState::Done
    }
}

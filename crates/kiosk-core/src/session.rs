//! Per-visit session state owned by the orchestrator.

use crate::cart::OrderCart;
use crate::screen::{ScreenState, ScreenStateMachine};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One customer visit.
///
/// `pending_item_id` is the short-lived memory of the item the agent selected
/// most recently; quantity actions in the same or a later turn apply to it.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub store: String,
    pub screen: ScreenStateMachine,
    pub pending_item_id: Option<String>,
    pub cart: OrderCart,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            session_id: new_session_id(),
            store: store.into(),
            screen: ScreenStateMachine::new(),
            pending_item_id: None,
            cart: OrderCart::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn screen(&self) -> ScreenState {
        self.screen.current()
    }

    /// Start a fresh visit for the same store: new id, empty cart, intro screen.
    pub fn reset(&mut self) {
        *self = Session::new(std::mem::take(&mut self.store));
    }
}

fn new_session_id() -> String {
    format!("sess_{}", Uuid::new_v4().simple())
}

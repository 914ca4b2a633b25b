//! # Kiosk Core - Cart, Screens and the Agent Action Protocol
//!
//! Everything a voice ordering turn touches that is not audio: the menu board,
//! the order cart, the screen state machine, the structured action protocol
//! returned by the dialogue agent, and the HTTP collaborators (dialogue,
//! catalog, payment).
//!
//! ## Turn data flow
//!
//! ```text
//! ┌────────────┐   transcript   ┌──────────────────┐  request   ┌──────────────┐
//! │  Shortcut  │ ─────────────→ │  DialogueClient  │ ─────────→ │ remote agent │
//! │  Matcher   │                └──────────────────┘ ←───────── └──────────────┘
//! └────────────┘                          │ actions
//!       │ screen                          ↓
//!       ↓                     ┌──────────────────────┐
//! ┌────────────┐   mutates    │   ActionDispatcher   │ ──→ OrderRequest ──→ PaymentGateway
//! │  Session   │ ←─────────── │  (cart, screen, menu)│
//! └────────────┘              └──────────────────────┘
//! ```

pub mod action;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod dispatcher;
pub mod error;
pub mod menu;
pub mod payment;
pub mod screen;
pub mod session;
pub mod shortcut;

pub use action::{Action, ActionError, Recommendation, KNOWN_ACTIONS};
pub use cart::{format_won, OrderCart, OrderItem};
pub use catalog::{load_board, parse_menu, CatalogSource, HttpCatalog};
pub use config::{KioskConfig, Phrases, SpeechCredentials};
pub use dialogue::{
    AgentTurnRequest, AgentTurnResponse, DialogueClient, DialogueOutcome, HttpDialogueClient,
    Profile,
};
pub use dispatcher::{ActionDispatcher, DispatchReport};
pub use error::{KioskError, KioskResult};
pub use menu::{normalize_name, MenuBoard, MenuItem};
pub use payment::{HttpPayment, OrderRequest, PaymentGateway};
pub use screen::{ScreenState, ScreenStateMachine};
pub use session::Session;
pub use shortcut::{LocalIntent, ShortcutConfig, ShortcutMatcher, ShortcutOutcome};

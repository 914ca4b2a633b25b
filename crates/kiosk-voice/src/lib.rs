//! # Kiosk Voice - Voice Ordering Turn Loop
//!
//! Speech in, agent in the middle, speech out. The speech session turns
//! provider events into finalized utterances; the orchestrator sends each one
//! to the dialogue agent, applies the returned actions, and speaks the reply.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │  Recognizer  │→ │ SpeechSession │→ │ shortcuts/agent/ │  │
//! │  │ (script/clip)│  │ (Idle↔Listen) │  │   dispatcher     │  │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘  │
//! │         ↑                                       ↓            │
//! │         │ start cancels playback      ┌──────────────────┐  │
//! │         └──────────────────────────── │   SpeechOutput   │  │
//! │                                       └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod orchestrator;
pub mod output;
pub mod recognizer;
pub mod session;
pub mod stt;
pub mod token;

pub use error::{VoiceError, VoiceResult};
pub use orchestrator::{
    FollowUpGate, ListenSummary, Orchestrator, OrchestratorConfig, OrderStatus, TurnOutcome,
    TurnReport,
};
pub use output::{CommandVoice, ConsoleVoice, SpeechOutput, SpeechSynthesizer};
pub use recognizer::{RecognitionEvent, Recognizer, ScriptFeeder, ScriptedRecognizer};
pub use session::{IdleReason, SessionState, SpeechEvent, SpeechSession};
pub use stt::{AudioClip, BackendStt, ClipRecognizer, ShortAudioStt, SpeechAuth, SttBackend};
pub use token::{HttpTokenSource, SpeechToken, TokenCache, TokenSource};

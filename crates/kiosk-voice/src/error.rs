//! Error types for the kiosk voice loop

use kiosk_core::KioskError;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while listening, transcribing, or speaking.
///
/// All of these are soft at the turn level: the speech session drops back to
/// idle and the customer can start again.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Speech token error: {0}")]
    Token(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] KioskError),
}

impl From<hound::Error> for VoiceError {
    fn from(err: hound::Error) -> Self {
        VoiceError::Stt(format!("WAV: {}", err))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VoiceError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VoiceError::ChannelSend(err.to_string())
    }
}

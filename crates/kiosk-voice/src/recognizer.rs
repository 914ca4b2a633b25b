//! Recognizer contract: the speech-to-text provider as seen by the speech session.
//!
//! A started recognizer yields raw [`RecognitionEvent`]s on a channel until it
//! is stopped or runs out of input. The speech session turns those into the
//! Listening / Interim / Final / Idle lifecycle.

use crate::error::VoiceResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Raw provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Partial hypothesis; may be revised.
    Interim(String),
    /// Finalized utterance.
    Final(String),
    /// Provider error (network, auth, audio).
    Error(String),
    /// Provider cancelled recognition.
    Canceled,
    /// Provider has no more input.
    Ended,
}

#[async_trait]
pub trait Recognizer: Send {
    /// Begin continuous recognition.
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<RecognitionEvent>>;

    /// Request termination. Events already queued may still be drained.
    async fn stop(&mut self) -> VoiceResult<()>;
}

const EVENT_BUFFER: usize = 32;

/// Recognizer driven by a [`ScriptFeeder`]: each start consumes the next script.
///
/// Used for text-driven kiosks (stdin) and for tests. A script that does not
/// end in `Final`, `Error`, `Canceled` or `Ended` keeps the recognizer open
/// until `stop()` is called.
pub struct ScriptedRecognizer {
    scripts: Arc<Mutex<mpsc::UnboundedReceiver<Vec<RecognitionEvent>>>>,
    task: Option<JoinHandle<()>>,
}

/// Handle that queues utterances for a [`ScriptedRecognizer`]. Dropping every
/// feeder makes the recognizer report `Ended` once the queue is empty.
#[derive(Debug, Clone)]
pub struct ScriptFeeder {
    tx: mpsc::UnboundedSender<Vec<RecognitionEvent>>,
}

impl ScriptFeeder {
    /// Queue one finalized utterance.
    pub fn say(&self, text: impl Into<String>) -> bool {
        self.push(vec![RecognitionEvent::Final(text.into())])
    }

    /// Queue an arbitrary event script for the next listening session.
    pub fn push(&self, events: Vec<RecognitionEvent>) -> bool {
        self.tx.send(events).is_ok()
    }
}

impl ScriptedRecognizer {
    pub fn new() -> (Self, ScriptFeeder) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recognizer = Self {
            scripts: Arc::new(Mutex::new(rx)),
            task: None,
        };
        (recognizer, ScriptFeeder { tx })
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<RecognitionEvent>> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let scripts = Arc::clone(&self.scripts);
        self.task = Some(tokio::spawn(async move {
            let next = scripts.lock().await.recv().await;
            let Some(events) = next else {
                let _ = tx.send(RecognitionEvent::Ended).await;
                return;
            };
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            // Stay open like a live microphone until stopped.
            tx.closed().await;
        }));
        debug!("scripted recognizer started");
        Ok(rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ScriptedRecognizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

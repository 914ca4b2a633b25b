//! **SpeechSession**: the continuous-recognition lifecycle.
//!
//! State machine `Idle → Listening → Idle`. Events come out of
//! [`SpeechSession::next_event`] in order; for every utterance the `Final`
//! event precedes the `Idle` event that closes its listening session.

use crate::error::VoiceResult;
use crate::recognizer::{RecognitionEvent, Recognizer};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Why a listening session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleReason {
    /// A final utterance arrived and recognition paused automatically.
    Finalized,
    /// `stop()` was called.
    Stopped,
    /// The provider ran out of input.
    Ended,
    /// Provider error; soft, the user may start again.
    Failed(String),
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Listening,
    Interim(String),
    Final(String),
    Idle(IdleReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
}

pub struct SpeechSession {
    recognizer: Box<dyn Recognizer>,
    state: SessionState,
    events: Option<mpsc::Receiver<RecognitionEvent>>,
    last_interim: Option<String>,
    outbox: VecDeque<SpeechEvent>,
}

impl SpeechSession {
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            state: SessionState::Idle,
            events: None,
            last_interim: None,
            outbox: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    /// Begin listening. Returns `Ok(false)` when already listening.
    ///
    /// If the provider fails to start the session stays idle and the error is returned.
    pub async fn start(&mut self) -> VoiceResult<bool> {
        if self.is_listening() {
            debug!("start ignored: already listening");
            return Ok(false);
        }
        let rx = self.recognizer.start().await?;
        self.events = Some(rx);
        self.last_interim = None;
        self.state = SessionState::Listening;
        self.outbox.push_back(SpeechEvent::Listening);
        info!("🎤 listening");
        Ok(true)
    }

    /// Request graceful termination. Anything the provider already delivered is
    /// kept: a buffered final wins, otherwise the last interim becomes the final.
    pub async fn stop(&mut self) -> VoiceResult<()> {
        if !self.is_listening() {
            return Ok(());
        }
        let result = self.recognizer.stop().await;
        if let Err(ref e) = result {
            warn!("recognizer stop failed: {}", e);
        }

        let mut final_text = None;
        if let Some(mut rx) = self.events.take() {
            while let Ok(event) = rx.try_recv() {
                match event {
                    RecognitionEvent::Interim(text) => self.note_interim(text),
                    RecognitionEvent::Final(text) if !text.trim().is_empty() => {
                        final_text = Some(text);
                        break;
                    }
                    _ => {}
                }
            }
        }
        let final_text = final_text.or_else(|| self.last_interim.take());
        self.finish(final_text, IdleReason::Stopped);
        result
    }

    /// Next lifecycle event, or `None` while idle with nothing left to report.
    pub async fn next_event(&mut self) -> Option<SpeechEvent> {
        loop {
            if let Some(event) = self.outbox.pop_front() {
                return Some(event);
            }
            if !self.is_listening() {
                return None;
            }
            let received = match self.events.as_mut() {
                Some(rx) => rx.recv().await,
                None => None,
            };
            match received {
                Some(RecognitionEvent::Interim(text)) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    self.note_interim(text.clone());
                    return Some(SpeechEvent::Interim(text));
                }
                Some(RecognitionEvent::Final(text)) => {
                    let text = if text.trim().is_empty() {
                        match self.last_interim.take() {
                            Some(interim) => interim,
                            None => continue,
                        }
                    } else {
                        text
                    };
                    if let Err(e) = self.recognizer.stop().await {
                        warn!("recognizer auto-stop failed: {}", e);
                    }
                    self.finish(Some(text), IdleReason::Finalized);
                }
                Some(RecognitionEvent::Error(reason)) => {
                    warn!("recognition failed: {}", reason);
                    self.abandon(IdleReason::Failed(reason)).await;
                }
                Some(RecognitionEvent::Canceled) => {
                    warn!("recognition canceled");
                    self.abandon(IdleReason::Canceled).await;
                }
                Some(RecognitionEvent::Ended) | None => {
                    let interim = self.last_interim.take();
                    if let Err(e) = self.recognizer.stop().await {
                        debug!("recognizer stop after end: {}", e);
                    }
                    self.finish(interim, IdleReason::Ended);
                }
            }
        }
    }

    fn note_interim(&mut self, text: String) {
        if !text.trim().is_empty() {
            self.last_interim = Some(text);
        }
    }

    async fn abandon(&mut self, reason: IdleReason) {
        if let Err(e) = self.recognizer.stop().await {
            debug!("recognizer stop after failure: {}", e);
        }
        self.last_interim = None;
        self.finish(None, reason);
    }

    /// Leave Listening: queue the final (if any) and then the Idle notification.
    fn finish(&mut self, final_text: Option<String>, reason: IdleReason) {
        self.events = None;
        self.last_interim = None;
        self.state = SessionState::Idle;
        if let Some(text) = final_text {
            debug!("final: {}", text);
            self.outbox.push_back(SpeechEvent::Final(text));
        }
        info!("💤 idle ({:?})", reason);
        self.outbox.push_back(SpeechEvent::Idle(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::ScriptedRecognizer;

    async fn drain(session: &mut SpeechSession) -> Vec<SpeechEvent> {
        let mut out = Vec::new();
        while let Some(event) = session.next_event().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn final_precedes_idle() {
        let (recognizer, feeder) = ScriptedRecognizer::new();
        feeder.push(vec![
            RecognitionEvent::Interim("불고기".into()),
            RecognitionEvent::Final("불고기 두 개".into()),
        ]);
        let mut session = SpeechSession::new(Box::new(recognizer));

        assert!(session.start().await.unwrap());
        assert!(!session.start().await.unwrap());
        assert_eq!(
            drain(&mut session).await,
            vec![
                SpeechEvent::Listening,
                SpeechEvent::Interim("불고기".into()),
                SpeechEvent::Final("불고기 두 개".into()),
                SpeechEvent::Idle(IdleReason::Finalized),
            ]
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn stop_flushes_last_interim() {
        let (recognizer, feeder) = ScriptedRecognizer::new();
        feeder.push(vec![RecognitionEvent::Interim("김치찌개 하나".into())]);
        let mut session = SpeechSession::new(Box::new(recognizer));

        session.start().await.unwrap();
        assert_eq!(session.next_event().await, Some(SpeechEvent::Listening));
        assert_eq!(session.next_event().await, Some(SpeechEvent::Interim("김치찌개 하나".into())));

        session.stop().await.unwrap();
        assert_eq!(
            drain(&mut session).await,
            vec![
                SpeechEvent::Final("김치찌개 하나".into()),
                SpeechEvent::Idle(IdleReason::Stopped),
            ]
        );
    }

    #[tokio::test]
    async fn stop_drains_undelivered_interim() {
        let (recognizer, feeder) = ScriptedRecognizer::new();
        feeder.push(vec![
            RecognitionEvent::Interim("냉면".into()),
            RecognitionEvent::Interim("냉면 두 그릇".into()),
        ]);
        let mut session = SpeechSession::new(Box::new(recognizer));

        session.start().await.unwrap();
        assert_eq!(session.next_event().await, Some(SpeechEvent::Listening));
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        session.stop().await.unwrap();
        assert_eq!(
            drain(&mut session).await,
            vec![
                SpeechEvent::Final("냉면 두 그릇".into()),
                SpeechEvent::Idle(IdleReason::Stopped),
            ]
        );
    }

    #[tokio::test]
    async fn provider_error_is_soft() {
        let (recognizer, feeder) = ScriptedRecognizer::new();
        feeder.push(vec![
            RecognitionEvent::Interim("주".into()),
            RecognitionEvent::Error("network".into()),
        ]);
        feeder.say("주문할게요");
        let mut session = SpeechSession::new(Box::new(recognizer));

        session.start().await.unwrap();
        let events = drain(&mut session).await;
        assert_eq!(events.last(), Some(&SpeechEvent::Idle(IdleReason::Failed("network".into()))));
        assert!(!events.iter().any(|e| matches!(e, SpeechEvent::Final(_))));

        assert!(session.start().await.unwrap());
        let events = drain(&mut session).await;
        assert!(events.contains(&SpeechEvent::Final("주문할게요".into())));
    }

    #[tokio::test]
    async fn listening_and_idle_alternate() {
        let (recognizer, feeder) = ScriptedRecognizer::new();
        feeder.say("하나");
        feeder.push(vec![RecognitionEvent::Canceled]);
        feeder.say("셋");
        drop(feeder);
        let mut session = SpeechSession::new(Box::new(recognizer));

        let mut all = Vec::new();
        for _ in 0..4 {
            session.start().await.unwrap();
            // A second start while listening must not report Listening again.
            session.start().await.unwrap();
            all.extend(drain(&mut session).await);
        }

        let mut listening = false;
        for event in &all {
            match event {
                SpeechEvent::Listening => {
                    assert!(!listening, "Listening reported twice: {:?}", all);
                    listening = true;
                }
                SpeechEvent::Idle(_) => {
                    assert!(listening);
                    listening = false;
                }
                _ => {}
            }
        }
        assert_eq!(all.last(), Some(&SpeechEvent::Idle(IdleReason::Ended)));
    }
}

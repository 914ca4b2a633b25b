//! **SpeechOutput**: serialized spoken playback and the interruption kill-switch.
//!
//! At most one utterance plays at a time. `speak` cancels whatever is playing
//! before starting; `cancel` silences the synthesizer immediately.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Turns text into audible speech. `say` resolves when playback finishes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn say(&self, text: &str) -> VoiceResult<()>;

    /// Stop any audio in flight. Must not block.
    fn halt(&self);
}

pub struct SpeechOutput {
    synth: Arc<dyn SpeechSynthesizer>,
    current: Option<JoinHandle<()>>,
}

impl SpeechOutput {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synth, current: None }
    }

    /// Cancel in-flight playback, then start speaking `text` in the background.
    pub fn speak(&mut self, text: &str) {
        self.cancel();
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        info!("🔊 speaking: {}", text);
        let synth = Arc::clone(&self.synth);
        self.current = Some(tokio::spawn(async move {
            if let Err(e) = synth.say(&text).await {
                warn!("playback failed: {}", e);
            }
        }));
    }

    /// Halt audio immediately. Returns true if something was playing.
    pub fn cancel(&mut self) -> bool {
        let Some(handle) = self.current.take() else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }
        self.synth.halt();
        handle.abort();
        debug!("playback cancelled");
        true
    }

    pub fn is_speaking(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the current utterance to finish (or be cancelled).
    pub async fn wait_until_done(&mut self) {
        if let Some(handle) = self.current.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("playback task failed: {}", e);
                }
            }
        }
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Prints to stdout, paced by text length so cancellation is observable.
#[derive(Debug, Clone)]
pub struct ConsoleVoice {
    per_char: Duration,
}

impl Default for ConsoleVoice {
    fn default() -> Self {
        Self::new(Duration::from_millis(60))
    }
}

impl ConsoleVoice {
    pub fn new(per_char: Duration) -> Self {
        Self { per_char }
    }

    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleVoice {
    async fn say(&self, text: &str) -> VoiceResult<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("🔊 {}\n", text).as_bytes()).await?;
        stdout.flush().await?;
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        tokio::time::sleep(self.per_char.saturating_mul(chars)).await;
        Ok(())
    }

    fn halt(&self) {}
}

/// Runs an external TTS program with the text as its last argument
/// (e.g. `say`, `espeak-ng -v ko`). The process is killed on halt.
pub struct CommandVoice {
    program: String,
    args: Vec<String>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandVoice {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stop: Mutex::new(None),
        }
    }

    /// Split a command line on whitespace: first word is the program.
    pub fn from_command_line(line: &str) -> VoiceResult<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| VoiceError::Config("voice command is empty".into()))?;
        Ok(Self::new(program, words.collect()))
    }

    fn take_stop(&self) -> Option<oneshot::Sender<()>> {
        match self.stop.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandVoice {
    async fn say(&self, text: &str) -> VoiceResult<()> {
        if let Some(previous) = self.take_stop() {
            let _ = previous.send(());
        }
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("cannot run {}: {}", self.program, e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        match self.stop.lock() {
            Ok(mut guard) => *guard = Some(stop_tx),
            Err(poisoned) => *poisoned.into_inner() = Some(stop_tx),
        }

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    return Err(VoiceError::Playback(format!("{} exited with {}", self.program, status)));
                }
            }
            _ = stop_rx => {
                let _ = child.kill().await;
            }
        }
        Ok(())
    }

    fn halt(&self) {
        if let Some(stop) = self.take_stop() {
            let _ = stop.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Slow {
        halts: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for Slow {
        async fn say(&self, _text: &str) -> VoiceResult<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn halt(&self) {
            self.halts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn speak_cancels_previous_utterance() {
        let synth = Arc::new(Slow::default());
        let mut output = SpeechOutput::new(synth.clone());

        output.speak("첫 번째");
        tokio::task::yield_now().await;
        assert!(output.is_speaking());

        output.speak("두 번째");
        assert_eq!(synth.halts.load(Ordering::SeqCst), 1);

        output.wait_until_done().await;
        assert_eq!(synth.finished.load(Ordering::SeqCst), 1);
        assert!(!output.is_speaking());
    }

    #[tokio::test]
    async fn cancel_when_idle_is_a_no_op() {
        let synth = Arc::new(Slow::default());
        let mut output = SpeechOutput::new(synth.clone());
        assert!(!output.cancel());
        output.speak("   ");
        assert!(!output.is_speaking());
        assert_eq!(synth.halts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn command_line_parsing() {
        assert!(CommandVoice::from_command_line("  ").is_err());
        let voice = CommandVoice::from_command_line("espeak-ng -v ko").unwrap();
        assert_eq!(voice.program, "espeak-ng");
        assert_eq!(voice.args, vec!["-v", "ko"]);
    }

    #[tokio::test(start_paused = true)]
    async fn console_voice_paces_per_character() {
        let voice = ConsoleVoice::new(Duration::from_millis(10));
        let started = tokio::time::Instant::now();
        voice.say("비빔밥").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn console_voice_finishes() {
        let mut output = SpeechOutput::new(Arc::new(ConsoleVoice::instant()));
        output.speak("주문이 완료되었어요.");
        output.wait_until_done().await;
        assert!(!output.is_speaking());
    }
}

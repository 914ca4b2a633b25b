//! Kiosk CLI: a voice ordering kiosk for one storefront.
//!
//! Usage:
//!   kiosk                          type utterances on stdin, one per line
//!   kiosk --wav a.wav b.wav ...    transcribe recorded clips in order
//!   kiosk --wav a.wav --short-audio  use the speech provider instead of the backend
//!
//! Configuration comes from `config/kiosk.toml` (or `KIOSK_CONFIG`) and
//! `KIOSK__*` environment variables; `.env` is loaded first.

use kiosk_core::{HttpCatalog, HttpDialogueClient, HttpPayment, KioskConfig, ScreenState};
use kiosk_voice::{
    BackendStt, ClipRecognizer, CommandVoice, ConsoleVoice, HttpTokenSource, Orchestrator,
    OrchestratorConfig, Recognizer, ScriptedRecognizer, ShortAudioStt,
    SpeechAuth, SpeechOutput, SpeechSession, SpeechSynthesizer, SttBackend, TokenCache,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(10);
const LISTEN_ATTEMPTS: u32 = 3;
const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let mut clips: Vec<PathBuf> = Vec::new();
    let mut short_audio = false;
    let mut store: Option<String> = None;
    let mut in_clips = false;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--wav" => in_clips = true,
            "--short-audio" => short_audio = true,
            "--store" => store = args.next(),
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other if in_clips && !other.starts_with("--") => clips.push(PathBuf::from(other)),
            other => {
                eprintln!("unknown argument: {}", other);
                print_usage();
                return Ok(());
            }
        }
    }

    let mut config = KioskConfig::load()?;
    if let Some(store) = store {
        config.store = store;
    }
    if short_audio && !config.speech.key.trim().is_empty() {
        config.validate()?;
    } else {
        config.validate_backend()?;
    }

    let base = config.backend_url().to_string();
    let dialogue = Arc::new(HttpDialogueClient::new(&base, &config.dialogue_path, config.dialogue_timeout())?);
    let payment = Arc::new(HttpPayment::new(base.clone(), COLLABORATOR_TIMEOUT)?);
    let catalog = Arc::new(HttpCatalog::new(base.clone(), COLLABORATOR_TIMEOUT)?);

    let synth: Arc<dyn SpeechSynthesizer> = match config.voice_command.as_deref() {
        Some(line) if !line.trim().is_empty() => Arc::new(CommandVoice::from_command_line(line)?),
        _ => Arc::new(ConsoleVoice::default()),
    };

    let recognizer: Box<dyn Recognizer> = if clips.is_empty() {
        let (recognizer, feeder) = ScriptedRecognizer::new();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        if !feeder.say(line) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });
        info!("⌨️ reading utterances from stdin");
        Box::new(recognizer)
    } else {
        let backend: Arc<dyn SttBackend> = if short_audio {
            let auth = if config.speech.key.trim().is_empty() {
                let source = Arc::new(HttpTokenSource::new(&base, COLLABORATOR_TIMEOUT)?);
                SpeechAuth::Token(Arc::new(TokenCache::new(source)))
            } else {
                SpeechAuth::Key(config.speech.key.clone())
            };
            Arc::new(ShortAudioStt::new(
                auth,
                config.speech.region().map(str::to_string),
                config.speech.endpoint().map(str::to_string),
                config.language.clone(),
            )?)
        } else {
            Arc::new(BackendStt::new(&base, COLLABORATOR_TIMEOUT)?)
        };
        info!("🎧 {} clip(s) queued", clips.len());
        Box::new(ClipRecognizer::new(backend, clips))
    };

    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig::from(&config),
        SpeechSession::new(recognizer),
        SpeechOutput::new(synth),
        dialogue,
        payment,
    )
    .with_catalog(catalog);

    let items = orchestrator.load_menu().await;
    info!("🏪 {} ready with {} menu items", config.store, items);

    loop {
        if let Err(e) = orchestrator
            .start_listening_with_retry(LISTEN_ATTEMPTS, LISTEN_RETRY_DELAY)
            .await
        {
            warn!("speech provider unavailable, waiting before the next try: {}", e);
            tokio::time::sleep(LISTEN_RETRY_DELAY).await;
            continue;
        }
        let summary = orchestrator.run_until_idle().await;
        for turn in &summary.turns {
            info!(
                "turn: {:?} → screen={} total={} order={:?}",
                turn.utterance, turn.screen, turn.cart_total, turn.order
            );
        }
        orchestrator.wait_for_speech().await;

        if summary.exhausted() {
            info!("input exhausted");
            break;
        }
        if orchestrator.screen() == ScreenState::Done {
            orchestrator.reset_visit().await;
        }
        if !orchestrator.wants_listening() {
            info!("🛑 listening stopped by customer");
            break;
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("kiosk: voice ordering kiosk");
    eprintln!("  (no args)              Read utterances from stdin, one per line");
    eprintln!("  --wav CLIP...          Transcribe WAV clips in order instead of stdin");
    eprintln!("  --short-audio          Transcribe with the speech provider (needs speech credentials)");
    eprintln!("  --store NAME           Override the configured store name");
    eprintln!();
    eprintln!("Config: config/kiosk.toml or KIOSK_CONFIG; env KIOSK__BACKEND_BASE_URL, KIOSK__SPEECH__KEY, ...");
}

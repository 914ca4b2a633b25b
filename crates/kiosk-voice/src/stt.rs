//! **Speech-to-Text (STT)**: turn recorded clips into text.
//!
//! Two remote backends implement [`SttBackend`]: the kiosk backend's own
//! transcription endpoint and the speech provider's short-audio REST API.
//! [`ClipRecognizer`] wraps either one into the [`Recognizer`] contract so a
//! queue of WAV clips can drive the speech session like a microphone.

use crate::error::{VoiceError, VoiceResult};
use crate::recognizer::{RecognitionEvent, Recognizer};
use crate::token::TokenCache;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// From f32 samples in [-1.0, 1.0]; out-of-range values are clamped.
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let samples = samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16)
            .collect();
        Self { samples, sample_rate }
    }

    /// Read a WAV file, downmixing to mono and converting to 16-bit.
    pub fn from_wav_file(path: &Path) -> VoiceResult<Self> {
        let reader = hound::WavReader::open(path)?;
        Self::from_wav_reader(reader)
    }

    pub fn from_wav_bytes(bytes: &[u8]) -> VoiceResult<Self> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        Self::from_wav_reader(reader)
    }

    fn from_wav_reader<R: std::io::Read>(mut reader: hound::WavReader<R>) -> VoiceResult<Self> {
        let spec = reader.spec();
        let interleaved: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16))
                .collect::<Result<_, _>>()?,
            hound::SampleFormat::Int if spec.bits_per_sample <= 16 => {
                let shift = 16 - u32::from(spec.bits_per_sample);
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v << shift))
                    .collect::<Result<_, _>>()?
            }
            hound::SampleFormat::Int => {
                let shift = u32::from(spec.bits_per_sample) - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<Result<_, _>>()?
            }
        };
        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                    (sum / frame.len() as i32) as i16
                })
                .collect()
        };
        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Encode as a 16-bit mono WAV file for upload.
    pub fn to_wav_bytes(&self) -> VoiceResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Backend for converting one clip to text. An empty string means no speech.
#[async_trait]
pub trait SttBackend: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> VoiceResult<String>;
}

/// The kiosk backend's `POST /api/audio/transcribe` (multipart `file`) → `{ text }`.
#[derive(Debug, Clone)]
pub struct BackendStt {
    url: String,
    client: reqwest::Client,
}

impl BackendStt {
    pub fn new(base_url: &str, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(Self {
            url: format!("{}/api/audio/transcribe", base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl SttBackend for BackendStt {
    async fn transcribe(&self, clip: &AudioClip) -> VoiceResult<String> {
        if clip.is_empty() {
            return Ok(String::new());
        }
        let part = reqwest::multipart::Part::bytes(clip.to_wav_bytes()?)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let res = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!("transcribe API error {}: {}", status, body)));
        }
        let json: serde_json::Value = res.json().await.map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(json
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string())
    }
}

/// How the short-audio recognizer authenticates.
pub enum SpeechAuth {
    /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
    Key(String),
    /// Bearer token from the backend's token endpoint.
    Token(Arc<TokenCache>),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShortAudioReply {
    recognition_status: String,
    #[serde(default)]
    display_text: String,
}

const SHORT_AUDIO_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";

/// The speech provider's short-audio REST recognizer.
pub struct ShortAudioStt {
    auth: SpeechAuth,
    region: Option<String>,
    endpoint: Option<String>,
    language: String,
    client: reqwest::Client,
}

impl ShortAudioStt {
    /// `endpoint`, when set, replaces the regional host entirely.
    pub fn new(
        auth: SpeechAuth,
        region: Option<String>,
        endpoint: Option<String>,
        language: impl Into<String>,
    ) -> VoiceResult<Self> {
        if region.is_none() && endpoint.is_none() && !matches!(auth, SpeechAuth::Token(_)) {
            return Err(VoiceError::Config("short-audio STT needs a region or an endpoint".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(Self {
            auth,
            region,
            endpoint,
            language: language.into(),
            client,
        })
    }

    fn url_for(&self, region: Option<&str>, endpoint: Option<&str>) -> VoiceResult<String> {
        if let Some(endpoint) = endpoint.or(self.endpoint.as_deref()) {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        let region = region
            .or(self.region.as_deref())
            .ok_or_else(|| VoiceError::Config("no speech region available".into()))?;
        Ok(format!("https://{}.stt.speech.microsoft.com{}", region, SHORT_AUDIO_PATH))
    }
}

#[async_trait]
impl SttBackend for ShortAudioStt {
    async fn transcribe(&self, clip: &AudioClip) -> VoiceResult<String> {
        if clip.is_empty() {
            return Ok(String::new());
        }
        let (url, request) = match &self.auth {
            SpeechAuth::Key(key) => {
                let url = self.url_for(None, None)?;
                (url.clone(), self.client.post(url).header("Ocp-Apim-Subscription-Key", key))
            }
            SpeechAuth::Token(cache) => {
                let token = cache.get().await?;
                let url = self.url_for(token.region.as_deref(), token.endpoint.as_deref())?;
                (url.clone(), self.client.post(url).bearer_auth(&token.token))
            }
        };
        debug!("short-audio STT → {}", url);
        let content_type = format!("audio/wav; codecs=audio/pcm; samplerate={}", clip.sample_rate);
        let res = request
            .query(&[("language", self.language.as_str()), ("format", "simple")])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(clip.to_wav_bytes()?)
            .send()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            if let SpeechAuth::Token(cache) = &self.auth {
                if status == reqwest::StatusCode::UNAUTHORIZED {
                    cache.invalidate().await;
                }
            }
            return Err(VoiceError::Stt(format!("short-audio STT error {}", status)));
        }
        let reply: ShortAudioReply = res.json().await.map_err(|e| VoiceError::Stt(e.to_string()))?;
        match reply.recognition_status.as_str() {
            "Success" => Ok(reply.display_text.trim().to_string()),
            "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Ok(String::new()),
            other => Err(VoiceError::Stt(format!("recognition status {}", other))),
        }
    }
}

/// Recognizer over a queue of recorded clips: each listening session
/// transcribes the next clip and reports it as one final utterance.
pub struct ClipRecognizer {
    backend: Arc<dyn SttBackend>,
    clips: Arc<Mutex<VecDeque<PathBuf>>>,
    task: Option<JoinHandle<()>>,
}

impl ClipRecognizer {
    pub fn new(backend: Arc<dyn SttBackend>, clips: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            backend,
            clips: Arc::new(Mutex::new(clips.into_iter().collect())),
            task: None,
        }
    }

    pub async fn remaining(&self) -> usize {
        self.clips.lock().await.len()
    }
}

#[async_trait]
impl Recognizer for ClipRecognizer {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<RecognitionEvent>> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let (tx, rx) = mpsc::channel(4);
        let Some(path) = self.clips.lock().await.pop_front() else {
            tx.send(RecognitionEvent::Ended).await?;
            return Ok(rx);
        };
        let backend = Arc::clone(&self.backend);
        self.task = Some(tokio::spawn(async move {
            info!("🎧 transcribing {}", path.display());
            let event = match AudioClip::from_wav_file(&path) {
                Ok(clip) => match backend.transcribe(&clip).await {
                    Ok(text) if !text.is_empty() => RecognitionEvent::Final(text),
                    Ok(_) => RecognitionEvent::Error(format!("no speech in {}", path.display())),
                    Err(e) => RecognitionEvent::Error(e.to_string()),
                },
                Err(e) => {
                    warn!("cannot read {}: {}", path.display(), e);
                    RecognitionEvent::Error(e.to_string())
                }
            };
            let _ = tx.send(event).await;
        }));
        Ok(rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ClipRecognizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

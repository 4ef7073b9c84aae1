//! Text-to-speech through Google Cloud Text-to-Speech
//!
//! Synthesis happens inside the handler call; playback is handed to a
//! background thread so the caller gets an answer without waiting for the
//! audio to finish.

use crate::audio::{decode_wav, AudioClip, AudioSink};
use crate::integration::handler::Handler;
use crate::messages::{Context, Message};
use crate::speech::text::{normalize_text_for_tts, split_for_synthesis};
use crate::{ChronosError, Result};
use async_trait::async_trait;
use base64::Engine;
use parking_lot::{Condvar, Mutex};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Reply returned once playback has been started
pub const PLAYBACK_STARTED: &str = "played";

/// Reply returned when nothing could be synthesized
pub const PLAYBACK_FAILED: &str = "failed";

/// Configuration for the speech service
#[derive(Clone, Debug)]
pub struct TTSConfig {
    /// Voice name, e.g. `en-US-Studio-O`
    pub voice: String,

    /// BCP-47 language code
    pub language_code: String,

    /// Speaking rate (1.0 = normal)
    pub speaking_rate: f32,

    /// Output sample rate requested from the service
    pub sample_rate: u32,

    /// Base URL override
    pub endpoint: Option<String>,

    /// OAuth bearer token
    pub access_token: Option<String>,

    /// Per-request input limit in bytes
    pub max_request_bytes: usize,

    pub timeout: Duration,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            voice: "en-US-Studio-O".to_string(),
            language_code: "en-US".to_string(),
            speaking_rate: 1.0,
            sample_rate: 24000,
            endpoint: None,
            access_token: None,
            max_request_bytes: 5000,
            timeout: Duration::from_secs(60),
        }
    }
}

impl TTSConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the voice; the language code is derived from its prefix
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        let parts: Vec<&str> = self.voice.splitn(3, '-').collect();
        if parts.len() == 3 {
            self.language_code = format!("{}-{}", parts[0], parts[1]);
        }
        self
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = language_code.into();
        self
    }

    /// Set the speaking rate, clamped to the range the service accepts
    pub fn with_speaking_rate(mut self, rate: f32) -> Self {
        self.speaking_rate = rate.clamp(0.25, 4.0);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn synthesize_url(&self) -> String {
        let base = self
            .endpoint
            .as_deref()
            .unwrap_or("https://texttospeech.googleapis.com")
            .trim_end_matches('/');
        format!("{}/v1/text:synthesize", base)
    }
}

/// Turns text into audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}

/// Google Cloud Text-to-Speech client
pub struct GoogleTts {
    config: TTSConfig,
    http: reqwest::Client,
}

impl GoogleTts {
    pub fn new(config: TTSConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChronosError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!(voice = %config.voice, "Speech synthesizer ready");
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &TTSConfig {
        &self.config
    }

    pub fn build_body(&self, text: &str) -> Value {
        json!({
            "input": { "text": text },
            "voice": {
                "languageCode": self.config.language_code,
                "name": self.config.voice,
            },
            "audioConfig": {
                "audioEncoding": "LINEAR16",
                "speakingRate": self.config.speaking_rate,
                "sampleRateHertz": self.config.sample_rate,
            },
        })
    }

    async fn synthesize_chunk(&self, text: &str) -> Result<AudioClip> {
        let mut builder = self
            .http
            .post(self.config.synthesize_url())
            .json(&self.build_body(text));
        if let Some(token) = &self.config.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChronosError::TTSError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChronosError::TTSError(format!(
                "Speech service returned {}: {}",
                status, text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChronosError::TTSError(format!("Invalid response: {}", e)))?;

        let encoded = body
            .get("audioContent")
            .and_then(Value::as_str)
            .ok_or_else(|| ChronosError::TTSError("Response has no audioContent".into()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ChronosError::TTSError(format!("Invalid audio encoding: {}", e)))?;

        decode_wav(&bytes)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let chunks = split_for_synthesis(text, self.config.max_request_bytes);
        debug!(chunks = chunks.len(), "Synthesizing speech");

        let mut combined: Option<AudioClip> = None;
        for chunk in chunks {
            let clip = self.synthesize_chunk(&chunk).await?;
            match combined.as_mut() {
                Some(acc) => acc.samples.extend_from_slice(&clip.samples),
                None => combined = Some(clip),
            }
        }

        combined.ok_or_else(|| ChronosError::TTSError("Nothing to synthesize".into()))
    }
}

/// Counts playback threads that have not finished yet
#[derive(Default)]
struct PlaybackTracker {
    active: Mutex<usize>,
    idle: Condvar,
}

impl PlaybackTracker {
    fn begin(&self) {
        *self.active.lock() += 1;
    }

    fn end(&self) {
        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut active = self.active.lock();
        while *active > 0 {
            if self.idle.wait_until(&mut active, deadline).timed_out() {
                return *active == 0;
            }
        }
        true
    }
}

/// Counts as in-flight playback until dropped.
///
/// Taken before speech is handed to a background task, so
/// [`SpeechHandler::wait_for_playback`] also covers speech still being
/// synthesized.
pub struct PlaybackGuard {
    playback: Arc<PlaybackTracker>,
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        self.playback.end();
    }
}

/// Coordinator handler that speaks the message content
pub struct SpeechHandler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    playback: Arc<PlaybackTracker>,
}

impl SpeechHandler {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            synthesizer,
            sink,
            playback: Arc::new(PlaybackTracker::default()),
        }
    }

    /// Block until every started playback has finished. Returns `false` on timeout.
    pub fn wait_for_playback(&self, timeout: Duration) -> bool {
        self.playback.wait_idle(timeout)
    }

    /// Mark speech as pending before it reaches the handler
    pub fn reserve_playback(&self) -> PlaybackGuard {
        self.playback.begin();
        PlaybackGuard {
            playback: Arc::clone(&self.playback),
        }
    }

    fn start_playback(&self, clip: AudioClip) -> Result<()> {
        let sink = Arc::clone(&self.sink);
        let playback = Arc::clone(&self.playback);

        playback.begin();
        let spawned = thread::Builder::new()
            .name("chronos-playback".into())
            .spawn({
                let playback = Arc::clone(&playback);
                move || {
                    if let Err(e) = sink.play(&clip) {
                        error!("Audio playback failed: {}", e);
                    }
                    playback.end();
                }
            });

        if let Err(e) = spawned {
            playback.end();
            return Err(ChronosError::AudioDeviceError(format!(
                "Failed to start playback thread: {}",
                e
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for SpeechHandler {
    async fn handle(&self, message: &Message, _context: &Context) -> Result<Value> {
        let text = normalize_text_for_tts(&message.content_text());
        if text.is_empty() {
            warn!("Nothing to speak after normalization");
            return Ok(Value::String(PLAYBACK_FAILED.to_string()));
        }

        let clip = self.synthesizer.synthesize(&text).await?;
        if clip.is_empty() {
            warn!("Speech service returned no audio");
            return Ok(Value::String(PLAYBACK_FAILED.to_string()));
        }

        info!("Speaking {:.2}s of audio", clip.duration_secs());
        self.start_playback(clip)?;
        Ok(Value::String(PLAYBACK_STARTED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ToneSynth;

    #[async_trait]
    impl SpeechSynthesizer for ToneSynth {
        async fn synthesize(&self, text: &str) -> Result<AudioClip> {
            Ok(AudioClip::new(vec![0.1; text.len() * 10], 24000, 1))
        }
    }

    /// Sink that sleeps to simulate audible playback
    #[derive(Default)]
    struct SlowSink {
        played: AtomicUsize,
    }

    impl AudioSink for SlowSink {
        fn play(&self, _clip: &AudioClip) -> Result<()> {
            thread::sleep(Duration::from_millis(150));
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_voice_sets_language() {
        let config = TTSConfig::new().with_voice("de-DE-Neural2-B");
        assert_eq!(config.language_code, "de-DE");
        assert_eq!(TTSConfig::default().voice, "en-US-Studio-O");
    }

    #[test]
    fn test_request_body() {
        let tts = GoogleTts::new(TTSConfig::default()).unwrap();
        let body = tts.build_body("Hello");
        assert_eq!(body["input"]["text"], "Hello");
        assert_eq!(body["voice"]["name"], "en-US-Studio-O");
        assert_eq!(body["audioConfig"]["audioEncoding"], "LINEAR16");
    }

    #[tokio::test]
    async fn test_handler_returns_before_playback_finishes() {
        let sink = Arc::new(SlowSink::default());
        let handler = SpeechHandler::new(Arc::new(ToneSynth), sink.clone());

        let out = handler
            .handle(&Message::new("text_to_speech", "Hello"), &Context::new())
            .await
            .unwrap();

        assert_eq!(out, json!(PLAYBACK_STARTED));
        assert_eq!(sink.played.load(Ordering::SeqCst), 0);

        assert!(handler.wait_for_playback(Duration::from_secs(5)));
        assert_eq!(sink.played.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reserved_playback_holds_wait() {
        let handler = Arc::new(SpeechHandler::new(Arc::new(ToneSynth), Arc::new(crate::audio::NullSink)));
        let guard = handler.reserve_playback();
        assert!(!handler.wait_for_playback(Duration::from_millis(20)));

        let release = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(guard);
        });
        assert!(handler.wait_for_playback(Duration::from_secs(5)));
        release.join().unwrap();
    }

    #[tokio::test]
    async fn test_empty_text_reports_failure() {
        let handler = SpeechHandler::new(Arc::new(ToneSynth), Arc::new(SlowSink::default()));
        let out = handler
            .handle(&Message::new("text_to_speech", "```\ncode only\n```"), &Context::new())
            .await
            .unwrap();
        assert_eq!(out, json!(PLAYBACK_FAILED));
    }
}

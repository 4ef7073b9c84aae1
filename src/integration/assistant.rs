//! Assistant: wires the coordinator, its handlers and conversation memory
//!
//! Flow for one turn: prompt -> `vertex_ai` -> memory (user + assistant
//! entries) -> optional `text_to_speech` in the background.

use crate::audio::{AudioSink, NullSink, WavFileSink};
use crate::integration::config::{EmbeddingBackend, Settings};
use crate::integration::coordinator::Coordinator;
use crate::integration::handler::EchoHandler;
use crate::llm::{LlmHandler, VertexClient};
use crate::memory::{
    EmbeddingService, HashEmbedding, InMemoryIndex, MatchingEngineIndex, MemoryStore, Role,
    VectorIndex, VertexEmbedding,
};
use crate::messages::{keys, Message};
use crate::speech::{GoogleTts, SpeechHandler};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handler name of the LLM
pub const LLM_HANDLER: &str = "vertex_ai";

/// Handler name of speech output
pub const SPEECH_HANDLER: &str = "text_to_speech";

/// Handler name of the echo probe
pub const ECHO_HANDLER: &str = "echo";

pub const DEFAULT_USER_ID: &str = "api_user";
pub const DEFAULT_SESSION_ID: &str = "api_session";

/// One user prompt and how to treat it
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub message: String,
    pub user_id: String,
    pub session_id: String,

    /// Also route the reply to speech output
    pub speak: bool,
}

impl ChatTurn {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: DEFAULT_USER_ID.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            speak: false,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_speech(mut self, speak: bool) -> Self {
        self.speak = speak;
        self
    }
}

/// The application-level facade shared by the HTTP server and the CLI
pub struct Assistant {
    coordinator: Arc<Coordinator>,
    memory: Option<Arc<MemoryStore>>,
    speech: Option<Arc<SpeechHandler>>,
}

impl Assistant {
    /// Wrap an existing coordinator; handlers are whatever it already has
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            memory: None,
            speech: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Register `speech` under [`SPEECH_HANDLER`] and keep a handle for
    /// waiting on playback
    pub fn with_speech(mut self, speech: Arc<SpeechHandler>) -> Self {
        self.coordinator.register_arc(SPEECH_HANDLER, speech.clone());
        self.speech = Some(speech);
        self
    }

    /// Build the full assistant from validated settings
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let coordinator = Arc::new(Coordinator::new());
        coordinator.register(ECHO_HANDLER, EchoHandler::default());

        let client = VertexClient::new(settings.llm.clone())?;
        coordinator.register(LLM_HANDLER, LlmHandler::new(Arc::new(client)));

        if let Some(instruction) = &settings.system_instruction {
            coordinator.set_context(keys::SYSTEM_INSTRUCTION, instruction.as_str());
        }

        let mut assistant = Self::new(coordinator);

        if settings.enable_tts {
            let synthesizer = GoogleTts::new(settings.tts.clone())?;
            let sink = build_sink(settings)?;
            assistant = assistant.with_speech(Arc::new(SpeechHandler::new(Arc::new(synthesizer), sink)));
        }

        if settings.memory.enabled {
            let store = open_memory(settings).await?;
            assistant = assistant.with_memory(Arc::new(store));
        }

        info!(
            handlers = ?assistant.coordinator.handler_names(),
            memory = assistant.memory.is_some(),
            "Assistant ready"
        );
        Ok(assistant)
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn memory(&self) -> Option<&Arc<MemoryStore>> {
        self.memory.as_ref()
    }

    /// Answer one prompt. `None` means the LLM handler was missing or failed.
    pub async fn ask(&self, turn: ChatTurn) -> Option<String> {
        let message = Message::new(LLM_HANDLER, turn.message.as_str())
            .with_field(keys::USER_ID, turn.user_id.as_str())
            .with_field(keys::SESSION_ID, turn.session_id.as_str());

        let reply = value_to_text(self.coordinator.route(&message).await?);
        debug!(user = %turn.user_id, session = %turn.session_id, "Got reply");

        if let Some(memory) = &self.memory {
            record_turn(memory, &turn, &reply).await;
        }

        if turn.speak {
            self.speak_in_background(reply.clone());
        }

        Some(reply)
    }

    /// Route `text` to speech output and wait for the handler's answer
    pub async fn speak(&self, text: &str) -> Option<Value> {
        self.coordinator
            .route(&Message::new(SPEECH_HANDLER, text))
            .await
    }

    fn speak_in_background(&self, text: String) {
        let coordinator = Arc::clone(&self.coordinator);
        let pending = self.speech.as_ref().map(|speech| speech.reserve_playback());
        tokio::spawn(async move {
            if coordinator
                .route(&Message::new(SPEECH_HANDLER, text))
                .await
                .is_none()
            {
                warn!("Reply could not be spoken");
            }
            drop(pending);
        });
    }

    /// Wait for speech that is still being synthesized or played.
    /// Returns `false` on timeout.
    pub async fn wait_for_playback(&self, timeout: Duration) -> bool {
        let Some(speech) = self.speech.clone() else {
            return true;
        };

        match tokio::task::spawn_blocking(move || speech.wait_for_playback(timeout)).await {
            Ok(idle) => idle,
            Err(e) => {
                warn!("Playback wait failed: {}", e);
                false
            }
        }
    }
}

async fn record_turn(memory: &MemoryStore, turn: &ChatTurn, reply: &str) {
    for (role, content) in [(Role::User, turn.message.as_str()), (Role::Assistant, reply)] {
        let entry_id = Uuid::new_v4().to_string();
        if let Err(e) = memory
            .save_conversation_entry(&turn.user_id, &turn.session_id, &entry_id, content, role)
            .await
        {
            warn!(role = %role, "Failed to record conversation entry: {}", e);
        }
    }
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn build_sink(settings: &Settings) -> Result<Arc<dyn AudioSink>> {
    if let Some(dir) = &settings.audio_dir {
        return Ok(Arc::new(WavFileSink::new(dir)?));
    }

    #[cfg(feature = "audio-io")]
    {
        match crate::audio::DeviceSink::probe() {
            Ok(name) => {
                info!("Using output device: {}", name);
                return Ok(Arc::new(crate::audio::DeviceSink::new()));
            }
            Err(e) => warn!("{}; speech will be discarded", e),
        }
    }

    Ok(Arc::new(NullSink))
}

async fn open_memory(settings: &Settings) -> Result<MemoryStore> {
    let memory = &settings.memory;

    let embedder: Arc<dyn EmbeddingService> = match memory.embedding_backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedding::default()),
        EmbeddingBackend::Vertex => {
            let mut embedder = VertexEmbedding::new(&settings.llm.project, &settings.llm.location)?
                .with_model(&memory.embedding_model);
            if let Some(endpoint) = &settings.llm.endpoint {
                embedder = embedder.with_endpoint(endpoint);
            }
            if let Some(token) = &settings.llm.access_token {
                embedder = embedder.with_access_token(token);
            }
            Arc::new(embedder)
        }
    };

    let hosted_index = memory.index.is_some();
    let index: Arc<dyn VectorIndex> = match &memory.index {
        Some(resource) => {
            let mut index = MatchingEngineIndex::new(&settings.llm.location, resource)?;
            if let Some(endpoint) = &memory.index_endpoint {
                index = index.with_index_endpoint(endpoint, &memory.deployed_index_id);
            }
            if let Some(base) = &settings.llm.endpoint {
                index = index.with_api_base(base);
            }
            if let Some(token) = &settings.llm.access_token {
                index = index.with_access_token(token);
            }
            Arc::new(index)
        }
        None => Arc::new(InMemoryIndex::new()),
    };

    let store = MemoryStore::open(&memory.storage_dir, embedder, index).await?;
    if !hosted_index {
        store.rebuild_index().await?;
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::handler::handler_fn;
    use crate::ChronosError;
    use serde_json::json;

    fn assistant_with_fake_llm() -> Assistant {
        let coordinator = Arc::new(Coordinator::new());
        coordinator.register(
            LLM_HANDLER,
            handler_fn(|msg, _| Ok(json!(format!("reply to {}", msg.content_text())))),
        );
        Assistant::new(coordinator)
    }

    #[tokio::test]
    async fn test_ask_returns_reply() {
        let assistant = assistant_with_fake_llm();
        let reply = assistant.ask(ChatTurn::new("hi")).await;
        assert_eq!(reply.as_deref(), Some("reply to hi"));
    }

    #[tokio::test]
    async fn test_ask_without_llm_is_none() {
        let assistant = Assistant::new(Arc::new(Coordinator::new()));
        assert!(assistant.ask(ChatTurn::new("hi")).await.is_none());
    }

    #[tokio::test]
    async fn test_ask_records_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(
            dir.path(),
            Arc::new(HashEmbedding::default()),
            Arc::new(InMemoryIndex::new()),
        )
        .await
        .unwrap();

        let assistant = assistant_with_fake_llm().with_memory(Arc::new(store));
        assistant
            .ask(ChatTurn::new("hello").with_user("u1").with_session("s1"))
            .await
            .unwrap();

        let entries = assistant
            .memory()
            .unwrap()
            .load_conversation("u1", "s1")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "hello");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].content, "reply to hello");
    }

    #[tokio::test]
    async fn test_failed_llm_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(
            dir.path(),
            Arc::new(HashEmbedding::default()),
            Arc::new(InMemoryIndex::new()),
        )
        .await
        .unwrap();

        let coordinator = Arc::new(Coordinator::new());
        coordinator.register(
            LLM_HANDLER,
            handler_fn(|_, _| Err(ChronosError::InferenceError("down".into()))),
        );
        let assistant = Assistant::new(coordinator).with_memory(Arc::new(store));

        assert!(assistant.ask(ChatTurn::new("hello")).await.is_none());
        let entries = assistant
            .memory()
            .unwrap()
            .load_conversation(DEFAULT_USER_ID, DEFAULT_SESSION_ID)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    /// Synthesizer that takes a while before producing audio
    struct SlowSynth;

    #[async_trait::async_trait]
    impl crate::speech::SpeechSynthesizer for SlowSynth {
        async fn synthesize(&self, text: &str) -> Result<crate::audio::AudioClip> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(crate::audio::AudioClip::new(vec![0.1; text.len() * 10], 24000, 1))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        played: std::sync::atomic::AtomicUsize,
    }

    impl AudioSink for CountingSink {
        fn play(&self, _clip: &crate::audio::AudioClip) -> Result<()> {
            self.played.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_for_playback_covers_pending_synthesis() {
        let sink = Arc::new(CountingSink::default());
        let speech = Arc::new(SpeechHandler::new(Arc::new(SlowSynth), sink.clone()));
        let assistant = assistant_with_fake_llm().with_speech(speech);

        let reply = assistant.ask(ChatTurn::new("hello").with_speech(true)).await;
        assert_eq!(reply.as_deref(), Some("reply to hello"));
        assert_eq!(sink.played.load(std::sync::atomic::Ordering::SeqCst), 0);

        assert!(assistant.wait_for_playback(Duration::from_secs(5)).await);
        assert_eq!(sink.played.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_settings_reindexes_existing_logs() {
        let dir = tempfile::tempdir().unwrap();
        let mem_dir = dir.path().join("mem");
        {
            let store = MemoryStore::open(
                &mem_dir,
                Arc::new(HashEmbedding::default()),
                Arc::new(InMemoryIndex::new()),
            )
            .await
            .unwrap();
            store
                .save_conversation_entry("u", "s", "1", "the quick brown fox", Role::User)
                .await
                .unwrap();
        }

        let settings = Settings::default()
            .with_llm(crate::llm::LLMConfig::new("proj", "us-central1"))
            .without_tts()
            .with_memory(&mem_dir, EmbeddingBackend::Hash);
        let assistant = Assistant::from_settings(&settings).await.unwrap();

        let hits = assistant
            .memory()
            .unwrap()
            .search("quick brown fox", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].datapoint_id, crate::memory::datapoint_id("u", "s", "1"));
    }

    #[tokio::test]
    async fn test_from_settings_requires_project() {
        let result = Assistant::from_settings(&Settings::default()).await;
        assert!(matches!(result, Err(ChronosError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_from_settings_registers_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default()
            .with_llm(crate::llm::LLMConfig::new("proj", "us-central1"))
            .with_system_instruction("Be brief.")
            .with_audio_dir(dir.path().join("audio"))
            .with_memory(dir.path().join("mem"), EmbeddingBackend::Hash);

        let assistant = Assistant::from_settings(&settings).await.unwrap();
        assert_eq!(
            assistant.coordinator().handler_names(),
            vec![ECHO_HANDLER, SPEECH_HANDLER, LLM_HANDLER]
        );
        assert_eq!(
            assistant
                .coordinator()
                .get_context(keys::SYSTEM_INSTRUCTION, Value::Null),
            json!("Be brief.")
        );
        assert!(assistant.memory().is_some());
    }
}

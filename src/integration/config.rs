//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components, read from the
//! process environment (after `.env` has been loaded by the binary).

use crate::llm::config::LLMConfig;
use crate::memory::VertexEmbedding;
use crate::speech::tts::TTSConfig;
use crate::{ChronosError, Result};
use std::path::PathBuf;

/// Which embedding backend the memory store uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Hosted Vertex AI text embedding model
    Vertex,
    /// Local hashed bag-of-words, no network
    Hash,
}

/// Conversation memory settings
#[derive(Clone, Debug)]
pub struct MemorySettings {
    pub enabled: bool,
    pub storage_dir: PathBuf,
    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,

    /// Vector Search index resource; an in-memory index is used when unset
    pub index: Option<String>,

    /// Index endpoint resource for neighbour queries
    pub index_endpoint: Option<String>,

    pub deployed_index_id: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            storage_dir: PathBuf::from("local_storage"),
            embedding_model: VertexEmbedding::DEFAULT_MODEL.to_string(),
            embedding_backend: EmbeddingBackend::Vertex,
            index: None,
            index_endpoint: None,
            deployed_index_id: "conversation_vectors".to_string(),
        }
    }
}

/// Configuration for the complete assistant
#[derive(Clone, Debug)]
pub struct Settings {
    /// LLM configuration
    pub llm: LLMConfig,

    /// Prompt stored under `system_instruction` in the coordinator context
    pub system_instruction: Option<String>,

    /// TTS configuration
    pub tts: TTSConfig,

    /// Whether to register the speech handler
    pub enable_tts: bool,

    /// Write speech to WAV files here instead of the output device
    pub audio_dir: Option<PathBuf>,

    pub memory: MemorySettings,

    /// HTTP listen port
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LLMConfig::default(),
            system_instruction: None,
            tts: TTSConfig::default(),
            enable_tts: true,
            audio_dir: None,
            memory: MemorySettings::default(),
            port: 5000,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        // LLM
        settings.llm.project = get("VERTEX_PROJECT").unwrap_or_default();
        settings.llm.location = get("VERTEX_LOCATION").unwrap_or_default();
        if let Some(model) = get("VERTEX_MODEL") {
            settings.llm.model_id = model;
        }
        settings.llm.endpoint = get("VERTEX_ENDPOINT");
        let token = get("GOOGLE_ACCESS_TOKEN");
        settings.llm.access_token = token.clone();

        settings.system_instruction = match (get("SYSTEM_INSTRUCTION"), get("SYSTEM_INSTRUCTION_FILE")) {
            (Some(text), _) => Some(text),
            (None, Some(path)) => Some(std::fs::read_to_string(&path).map_err(|e| {
                ChronosError::ConfigError(format!(
                    "Failed to read SYSTEM_INSTRUCTION_FILE {}: {}",
                    path, e
                ))
            })?),
            (None, None) => None,
        };

        // Speech
        if let Some(enabled) = get("TTS_ENABLED") {
            settings.enable_tts = parse_bool("TTS_ENABLED", &enabled)?;
        }
        if let Some(voice) = get("TTS_VOICE") {
            settings.tts = settings.tts.with_voice(voice);
        }
        if let Some(language) = get("TTS_LANGUAGE") {
            settings.tts = settings.tts.with_language(language);
        }
        if let Some(rate) = get("TTS_SPEAKING_RATE") {
            let rate: f32 = rate.parse().map_err(|_| {
                ChronosError::ConfigError(format!("TTS_SPEAKING_RATE is not a number: {}", rate))
            })?;
            settings.tts = settings.tts.with_speaking_rate(rate);
        }
        settings.tts.endpoint = get("TTS_ENDPOINT");
        settings.tts.access_token = token;
        settings.audio_dir = get("CHRONOS_AUDIO_DIR").map(PathBuf::from);

        // Memory
        if let Some(enabled) = get("MEMORY_ENABLED") {
            settings.memory.enabled = parse_bool("MEMORY_ENABLED", &enabled)?;
        }
        if let Some(dir) = get("CHRONOS_STORAGE_DIR") {
            settings.memory.storage_dir = PathBuf::from(dir);
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            settings.memory.embedding_model = model;
        }
        if let Some(backend) = get("EMBEDDING_BACKEND") {
            settings.memory.embedding_backend = match backend.to_ascii_lowercase().as_str() {
                "vertex" => EmbeddingBackend::Vertex,
                "hash" => EmbeddingBackend::Hash,
                other => {
                    return Err(ChronosError::ConfigError(format!(
                        "EMBEDDING_BACKEND must be 'vertex' or 'hash', got '{}'",
                        other
                    )))
                }
            };
        }
        settings.memory.index = get("MATCHING_ENGINE_INDEX");
        settings.memory.index_endpoint = get("MATCHING_ENGINE_ENDPOINT");
        if let Some(deployed) = get("MATCHING_ENGINE_DEPLOYED_INDEX") {
            settings.memory.deployed_index_id = deployed;
        }

        if let Some(port) = get("CHRONOS_PORT") {
            settings.port = port.parse().map_err(|_| {
                ChronosError::ConfigError(format!("CHRONOS_PORT is not a valid port: {}", port))
            })?;
        }

        Ok(settings)
    }

    /// Set the LLM configuration
    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Enable memory rooted at `dir`
    pub fn with_memory(mut self, dir: impl Into<PathBuf>, backend: EmbeddingBackend) -> Self {
        self.memory.enabled = true;
        self.memory.storage_dir = dir.into();
        self.memory.embedding_backend = backend;
        self
    }

    /// Write speech to WAV files instead of the output device
    pub fn with_audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = Some(dir.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Disable speech output (text-only mode)
    pub fn without_tts(mut self) -> Self {
        self.enable_tts = false;
        self
    }

    pub fn without_memory(mut self) -> Self {
        self.memory.enabled = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.project.is_empty() {
            return Err(ChronosError::ConfigError("VERTEX_PROJECT is not set".into()));
        }
        if self.llm.location.is_empty() {
            return Err(ChronosError::ConfigError("VERTEX_LOCATION is not set".into()));
        }
        if self.memory.enabled && self.memory.index_endpoint.is_some() && self.memory.index.is_none() {
            return Err(ChronosError::ConfigError(
                "MATCHING_ENGINE_ENDPOINT requires MATCHING_ENGINE_INDEX".into(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ChronosError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

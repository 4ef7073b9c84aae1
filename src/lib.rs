pub mod api;
pub mod audio;
pub mod cli;
pub mod integration;
pub mod llm;
pub mod memory;
pub mod messages;
pub mod speech;
pub mod telemetry;

use thiserror::Error;

pub use integration::{handler_fn, Coordinator, Dispatch, Handler};
pub use messages::{Context, Message};

#[derive(Error, Debug, Clone)]
pub enum ChronosError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("TTS error: {0}")]
    TTSError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl From<std::io::Error> for ChronosError {
    fn from(e: std::io::Error) -> Self {
        ChronosError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for ChronosError {
    fn from(e: serde_json::Error) -> Self {
        ChronosError::StorageError(format!("JSON error: {}", e))
    }
}

impl ChronosError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Missing credentials or endpoints need a restart with new settings
            ChronosError::ConfigError(_) => false,
            // The caller can resend a corrected message
            ChronosError::InvalidMessage(_) => true,
            // Hosted services fail transiently
            ChronosError::InferenceError(_) => true,
            ChronosError::TTSError(_) => true,
            ChronosError::EmbeddingError(_) => true,
            ChronosError::StorageError(_) => false,
            ChronosError::IOError(_) => false,
            ChronosError::AudioDeviceError(_) => false,
            ChronosError::AudioProcessingError(_) => true,
            ChronosError::ApiError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ChronosError::ConfigError(_) => {
                "Configuration error. Please check your environment settings.".to_string()
            }
            ChronosError::InvalidMessage(_) => {
                "The request was incomplete. Please try again.".to_string()
            }
            ChronosError::InferenceError(_) => {
                "AI response generation failed. Please try again.".to_string()
            }
            ChronosError::TTSError(_) => {
                "Text-to-speech failed. Response will be shown as text.".to_string()
            }
            ChronosError::EmbeddingError(_) => {
                "Conversation memory could not be indexed.".to_string()
            }
            ChronosError::StorageError(_) => "Conversation storage error occurred.".to_string(),
            ChronosError::IOError(_) => "File system error occurred.".to_string(),
            ChronosError::AudioDeviceError(_) => {
                "Audio device error. Please check your speakers.".to_string()
            }
            ChronosError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            ChronosError::ApiError(_) => "The HTTP server failed.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChronosError>;

//! Speech output
//!
//! This module provides:
//! - Markdown-aware text preparation for synthesis
//! - Google Cloud Text-to-Speech client
//! - The coordinator handler that speaks replies

pub mod text;
pub mod tts;

pub use text::{normalize_text_for_tts, split_for_synthesis};
pub use tts::{
    GoogleTts, PlaybackGuard, SpeechHandler, SpeechSynthesizer, TTSConfig, PLAYBACK_FAILED,
    PLAYBACK_STARTED,
};

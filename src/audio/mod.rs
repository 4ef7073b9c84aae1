//! Audio clips and the sinks that play or persist them

#[cfg(feature = "audio-io")]
pub mod output;
pub mod wav;

#[cfg(feature = "audio-io")]
pub use output::DeviceSink;
pub use wav::{decode_wav, encode_wav, WavFileSink};

use crate::Result;
use tracing::debug;

/// Decoded PCM audio, interleaved f32 samples in `[-1.0, 1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    /// Downmix to a single channel by averaging frames
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Destination for synthesized speech.
///
/// `play` blocks until the clip has been fully rendered, so callers that must
/// not wait run it on a thread of their own.
pub trait AudioSink: Send + Sync {
    fn play(&self, clip: &AudioClip) -> Result<()>;
}

/// Sink that discards audio; used when no output device is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, clip: &AudioClip) -> Result<()> {
        debug!(secs = clip.duration_secs(), "Discarding audio clip");
        Ok(())
    }
}

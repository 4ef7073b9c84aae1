use crate::audio::{AudioClip, AudioSink};
use crate::{ChronosError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Decode an in-memory WAV file
///
/// Integer samples of 8, 16, 24 or 32 bits and 32-bit float are accepted.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| ChronosError::AudioProcessingError(format!("Invalid WAV data: {}", e)))?;

    let spec = reader.spec();
    debug!(
        "Decoding WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let read_err =
        |e: hound::Error| ChronosError::AudioProcessingError(format!("Failed to read sample: {}", e));

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(read_err))
            .collect::<Result<_>>()?,
        SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8_388_608.0,
                32 => 2_147_483_648.0,
                bits => {
                    return Err(ChronosError::AudioProcessingError(format!(
                        "Unsupported bit depth: {}",
                        bits
                    )))
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|sample| sample as f32 / scale).map_err(read_err))
                .collect::<Result<_>>()?
        }
    };

    Ok(AudioClip::new(samples, spec.sample_rate, spec.channels))
}

/// Encode a clip as 16-bit PCM WAV
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let write_err = |e: hound::Error| ChronosError::IOError(format!("Failed to write WAV: {}", e));

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(write_err)?;
        for &sample in &clip.samples {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(sample_i16).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)?;
    }
    Ok(cursor.into_inner())
}

/// Sink that writes every clip to a numbered WAV file in a directory
pub struct WavFileSink {
    dir: PathBuf,
    counter: AtomicU64,
}

impl WavFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AudioSink for WavFileSink {
    fn play(&self, clip: &AudioClip) -> Result<()> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "speech_{}_{:04}.wav",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            n
        );
        let path = self.dir.join(name);

        std::fs::write(&path, encode_wav(clip)?)?;
        info!("Wrote {:.2}s of speech to {:?}", clip.duration_secs(), path);
        Ok(())
    }
}

use crate::audio::{AudioClip, AudioSink};
use crate::{ChronosError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Plays clips on the default output device
///
/// A fresh stream is opened for each clip and torn down once the buffer has
/// drained, so the device is only held while speech is audible.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceSink;

impl DeviceSink {
    pub fn new() -> Self {
        Self
    }

    /// Confirm an output device exists
    pub fn probe() -> Result<String> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| ChronosError::AudioDeviceError("No output device available".into()))?;
        Ok(device.name().unwrap_or_else(|_| "Unknown".to_string()))
    }
}

impl AudioSink for DeviceSink {
    fn play(&self, clip: &AudioClip) -> Result<()> {
        if clip.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ChronosError::AudioDeviceError("No output device available".into()))?;

        let config: StreamConfig = device
            .default_output_config()
            .map_err(|e| ChronosError::AudioDeviceError(format!("Failed to get output config: {}", e)))?
            .into();

        let channels = config.channels as usize;
        let mono = resample_linear(&clip.to_mono(), clip.sample_rate, config.sample_rate.0);
        let total = mono.len();
        let buffer = Arc::new(Mutex::new(VecDeque::from(mono)));
        let (done_tx, done_rx) = bounded::<()>(1);

        debug!(
            "Playing {:.2}s on {} ({} Hz, {} channels)",
            clip.duration_secs(),
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            channels
        );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut buf = buffer.lock();
                    for frame in data.chunks_mut(channels) {
                        let sample = buf.pop_front().unwrap_or(0.0);
                        frame.fill(sample);
                    }
                    if buf.is_empty() {
                        let _ = done_tx.try_send(());
                    }
                },
                |err| error!("Audio output stream error: {}", err),
                None,
            )
            .map_err(|e| ChronosError::AudioDeviceError(format!("Failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| ChronosError::AudioDeviceError(format!("Failed to start output stream: {}", e)))?;

        // Allow generous slack over the clip length before giving up
        let expected = total as f32 / config.sample_rate.0.max(1) as f32;
        let deadline = Duration::from_secs_f32(expected * 2.0 + 2.0);
        if done_rx.recv_timeout(deadline).is_err() {
            return Err(ChronosError::AudioDeviceError(
                "Playback did not finish in time".into(),
            ));
        }

        // Let the device flush its last period
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);
        info!("Finished playing {:.2}s of audio", clip.duration_secs());
        Ok(())
    }
}

/// Linear-interpolation resampler for mono audio
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] * (1.0 - frac) + samples[next] * frac
        })
        .collect()
}

//! Local playback of synthesized replies

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Decoded mono PCM
struct Pcm {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Plays MP3 replies on the default output device
pub struct AudioPlayback {
    device: cpal::Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(device = device.name().unwrap_or_default(), "audio playback initialized");
        Ok(Self { device })
    }

    /// Decode and play MP3 bytes, blocking until playback finishes
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or the device rejects the stream
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let pcm = decode_mp3(mp3_data)?;
        if pcm.samples.is_empty() {
            return Ok(());
        }

        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.min_sample_rate() <= SampleRate(pcm.sample_rate)
                    && c.max_sample_rate() >= SampleRate(pcm.sample_rate)
                    && c.sample_format() == cpal::SampleFormat::F32
            })
            .ok_or_else(|| Error::Audio(format!("no output config at {} Hz", pcm.sample_rate)))?;
        let config: StreamConfig = supported.with_sample_rate(SampleRate(pcm.sample_rate)).config();
        let channels = usize::from(config.channels);

        let total = pcm.samples.len();
        let samples = Arc::new(pcm.samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            self.device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.fetch_add(1, Ordering::Relaxed);
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            });
                            frame.fill(sample);
                        }
                    },
                    |err| tracing::error!(error = %err, "audio playback error"),
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (total as u64 * 1000) / u64::from(pcm.sample_rate);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);
        while !finished.load(Ordering::Relaxed) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }

        drop(stream);
        tracing::debug!(samples = total, "playback complete");
        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(24_000);
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(Pcm {
        samples,
        sample_rate: if sample_rate == 0 { 24_000 } else { sample_rate },
    })
}

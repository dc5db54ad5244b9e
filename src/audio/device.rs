//! Input device selection and blocking chunk reads via `cpal`.
//!
//! The capture loop wants the classic blocking shape — "read one chunk or
//! wait until the hardware has one" — while cpal only offers a callback API.
//! [`CpalSource`] bridges the two: the callback frames incoming buffers into
//! fixed-size [`AudioChunk`]s and sends them over an mpsc channel;
//! [`ChunkSource::read_chunk`] is a blocking `recv` on that channel.
//!
//! Device policy (matching the hardware rig): prefer an input device whose
//! name starts with the configured prefix, else fall back to the first
//! device with at least the configured channel count, else fail.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

use crate::config::AudioConfig;

/// One device read: `chunk_size * channels` interleaved 16-bit samples.
pub type AudioChunk = Vec<i16>;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors that can occur while selecting a device or running the stream.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device with at least {min_channels} channels found")]
    NoDevice { min_channels: u16 },

    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The stream callback stopped producing data (device unplugged or the
    /// stream was torn down while a read was pending).
    #[error("audio stream closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// ChunkSource / StreamOpener traits
// ---------------------------------------------------------------------------

/// A blocking source of fixed-size audio chunks.
///
/// `read_chunk` blocks until one chunk's worth of samples is available.
/// Dropping the source closes the underlying stream.
///
/// Deliberately not `Send`: `cpal::Stream` is pinned to its creating
/// thread, so a source lives and dies on the thread that opened it. Only
/// the [`StreamOpener`] crosses threads.
pub trait ChunkSource {
    fn read_chunk(&mut self) -> Result<AudioChunk, DeviceError>;
}

/// Opens a fresh stream on the resolved input device.
///
/// The capture loop calls this once per cycle; each cycle exclusively owns
/// the returned source for its lifetime. `Send` because the opener moves
/// onto the capture thread at startup.
pub trait StreamOpener: Send {
    fn open(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError>;
}

// ---------------------------------------------------------------------------
// ChunkFramer
// ---------------------------------------------------------------------------

/// Reassembles arbitrarily sized cpal callback buffers into fixed frames.
///
/// cpal delivers whatever buffer size the platform picked; the recorder
/// works in exact `chunk_size * channels` frames. Samples are converted
/// from the callback's `f32` range to interleaved `i16` on the way through.
pub(crate) struct ChunkFramer {
    pending: Vec<i16>,
    frame_len: usize,
}

impl ChunkFramer {
    pub(crate) fn new(frame_len: usize) -> Self {
        Self {
            pending: Vec::with_capacity(frame_len),
            frame_len,
        }
    }

    /// Feed callback samples; returns every completed frame, in order.
    pub(crate) fn push(&mut self, samples: &[f32]) -> Vec<AudioChunk> {
        self.pending.extend(samples.iter().map(|&s| f32_to_i16(s)));

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_len {
            let rest = self.pending.split_off(self.frame_len);
            frames.push(std::mem::replace(&mut self.pending, rest));
        }
        frames
    }
}

fn f32_to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

// ---------------------------------------------------------------------------
// CpalStreamOpener
// ---------------------------------------------------------------------------

/// Resolves the input device once at startup and opens one stream per cycle.
pub struct CpalStreamOpener {
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
    frame_len: usize,
}

impl CpalStreamOpener {
    /// Resolve the input device on the default host.
    ///
    /// Fails fast with [`DeviceError::NoDevice`] when nothing on the host
    /// meets the minimum input-channel requirement — the process must not
    /// report ready without a usable device.
    pub fn new(config: &AudioConfig) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = select_device(&host, config.device_name.as_deref(), config.channels)?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            stream_config,
            frame_len: config.chunk_size as usize * config.channels as usize,
        })
    }
}

impl StreamOpener for CpalStreamOpener {
    fn open(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError> {
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let mut framer = ChunkFramer::new(self.frame_len);

        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for frame in framer.push(data) {
                    // Ignore send errors; the receiver may have been dropped
                    // while the stream is being torn down.
                    let _ = tx.send(frame);
                }
            },
            |err: cpal::StreamError| {
                // Overflow and transient device hiccups are tolerated — the
                // stream keeps delivering whatever data is available.
                log::warn!("cpal stream error (continuing): {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;

        Ok(Box::new(CpalSource {
            rx,
            _stream: stream,
        }))
    }
}

// ---------------------------------------------------------------------------
// CpalSource
// ---------------------------------------------------------------------------

/// Blocking chunk reader over a live cpal stream.
///
/// Holding the `cpal::Stream` keeps the hardware stream alive; dropping the
/// source stops and closes it (RAII — there is no explicit close call, so
/// the stream is released on every cycle exit path).
struct CpalSource {
    rx: mpsc::Receiver<AudioChunk>,
    _stream: cpal::Stream,
}

impl ChunkSource for CpalSource {
    fn read_chunk(&mut self) -> Result<AudioChunk, DeviceError> {
        self.rx.recv().map_err(|_| DeviceError::Closed)
    }
}

// ---------------------------------------------------------------------------
// select_device
// ---------------------------------------------------------------------------

/// Device selection policy: name-prefix match wins, else the first device
/// with enough input channels, else `NoDevice`.
fn select_device(
    host: &cpal::Host,
    prefer_prefix: Option<&str>,
    min_channels: u16,
) -> Result<cpal::Device, DeviceError> {
    let mut fallback: Option<cpal::Device> = None;

    for device in host.input_devices()? {
        let name = device.name().unwrap_or_default();
        let channels = match device.default_input_config() {
            Ok(cfg) => cfg.channels(),
            Err(e) => {
                log::debug!("skipping device {name:?}: {e}");
                continue;
            }
        };

        if channels < min_channels {
            continue; // not enough inputs for the rig
        }

        if let Some(prefix) = prefer_prefix {
            if name.starts_with(prefix) {
                log::info!("found device: {name}");
                return Ok(device);
            }
        }

        if fallback.is_none() {
            log::info!("fallback device: {name}");
            fallback = Some(device);
        }
    }

    fallback.ok_or(DeviceError::NoDevice { min_channels })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- ChunkFramer -------------------------------------------------------

    #[test]
    fn framer_emits_nothing_below_frame_len() {
        let mut framer = ChunkFramer::new(8);
        assert!(framer.push(&[0.0; 7]).is_empty());
    }

    #[test]
    fn framer_emits_exact_frame() {
        let mut framer = ChunkFramer::new(4);
        let frames = framer.push(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4);
    }

    #[test]
    fn framer_carries_remainder_across_pushes() {
        let mut framer = ChunkFramer::new(4);
        assert!(framer.push(&[0.1; 3]).is_empty());

        // 3 pending + 6 new = 9 → two frames of 4, one sample left over
        let frames = framer.push(&[0.1; 6]);
        assert_eq!(frames.len(), 2);

        let frames = framer.push(&[0.1; 3]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn framer_preserves_sample_order() {
        let mut framer = ChunkFramer::new(2);
        let input: Vec<f32> = (1..=4).map(|v| v as f32 / 100.0).collect();
        let frames = framer.push(&input);

        let flat: Vec<i16> = frames.into_iter().flatten().collect();
        let expected: Vec<i16> = input.iter().map(|&s| f32_to_i16(s)).collect();
        assert_eq!(flat, expected);
    }

    // ---- f32 → i16 conversion ----------------------------------------------

    #[test]
    fn conversion_clamps_out_of_range() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn conversion_full_scale() {
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
    }

    // ---- Trait plumbing ----------------------------------------------------

    /// `AudioChunk` must be `Send` so it can cross thread boundaries.
    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    /// The opener is what moves onto the capture thread at startup.
    #[test]
    fn stream_opener_is_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<Box<dyn StreamOpener>>();
    }
}

//! Incremental WAV output via `hound`.
//!
//! [`WavSink`] wraps a `hound::WavWriter` with the recorder's fixed PCM
//! parameters. Writes happen chunk by chunk as the device delivers data;
//! [`finalize`](WavSink::finalize) patches the header and flushes. If a
//! cycle aborts before finalizing, `Drop` finalizes whatever was written so
//! the partial file on disk is still a valid WAV.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// WavSinkError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WavSinkError {
    #[error("failed to write WAV data: {0}")]
    Write(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// WavSink
// ---------------------------------------------------------------------------

/// A WAV file being written incrementally.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    /// Create the file at `path` with an explicit channel count, sample
    /// width and sample rate header taken from `config`.
    pub fn create(path: &Path, config: &AudioConfig) -> Result<Self, WavSinkError> {
        let spec = hound::WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample: config.bit_depth,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(Self {
            writer: Some(writer),
        })
    }

    /// Append interleaved samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<(), WavSinkError> {
        // The writer is only taken by finalize (consumes self) and Drop.
        let writer = self.writer.as_mut().ok_or(hound::Error::UnfinishedSample)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        Ok(())
    }

    /// Flush buffered data and patch the RIFF header.
    pub fn finalize(mut self) -> Result<(), WavSinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        // Abnormal exit path: keep the partial file readable.
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                log::error!("failed to finalize WAV on drop: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

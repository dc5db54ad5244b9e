//! WAV to MP3 conversion via an ffmpeg subprocess.
//!
//! The converted file lands in the processing directory under the same stem
//! with an `.mp3` extension. Loudness normalization (`loudnorm`) is applied
//! so quiet rehearsal-room takes come out at a usable level.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

// ---------------------------------------------------------------------------
// TranscodeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TranscodeError {
    /// ffmpeg could not be spawned (usually: not installed).
    #[error("failed to launch ffmpeg: {0}")]
    Launch(#[from] std::io::Error),

    /// ffmpeg ran but reported failure.
    #[error("ffmpeg exited with {code:?} converting {source_file}")]
    Failed {
        source_file: String,
        code: Option<i32>,
    },

    /// The source path has no stem to derive the target name from.
    #[error("source path has no file stem: {0}")]
    NoStem(String),
}

// ---------------------------------------------------------------------------
// Transcoder trait
// ---------------------------------------------------------------------------

/// Blocking conversion seam. Runs on a blocking worker, never on the
/// async runtime.
pub trait Transcoder: Send + Sync {
    /// Convert `source` and return the path of the produced file.
    fn convert(&self, source: &Path) -> Result<PathBuf, TranscodeError>;
}

// ---------------------------------------------------------------------------
// FfmpegTranscoder
// ---------------------------------------------------------------------------

/// ffmpeg-backed [`Transcoder`] implementation.
pub struct FfmpegTranscoder {
    process_dir: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(process_dir: impl Into<PathBuf>) -> Self {
        Self {
            process_dir: process_dir.into(),
        }
    }

    fn target_path(&self, source: &Path) -> Result<PathBuf, TranscodeError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| TranscodeError::NoStem(source.display().to_string()))?;
        Ok(self.process_dir.join(format!("{stem}.mp3")))
    }
}

impl Transcoder for FfmpegTranscoder {
    fn convert(&self, source: &Path) -> Result<PathBuf, TranscodeError> {
        let target = self.target_path(source)?;

        log::info!("converting {} -> {}", source.display(), target.display());
        let status = Command::new("ffmpeg")
            .arg("-y")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(source)
            .args(["-af", "loudnorm"])
            .args(["-codec:a", "libmp3lame"])
            .args(["-qscale:a", "2"])
            .arg(&target)
            .status()?;

        if !status.success() {
            return Err(TranscodeError::Failed {
                source_file: source.display().to_string(),
                code: status.code(),
            });
        }

        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

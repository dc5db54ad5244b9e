//! Cloud storage delivery for finished takes.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StorageConfig;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors from uploading a finished take.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The local file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport or connection error.
    #[error("upload request failed: {0}")]
    Request(String),

    /// The storage service answered with a non-success status.
    #[error("storage service returned status {0}")]
    Status(u16),

    /// The file has no usable name to upload under.
    #[error("source path has no file name: {0}")]
    NoFileName(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Async seam for the upload destination.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload `file` into `dest_dir`, keeping its file name.
    async fn upload(&self, file: &Path, dest_dir: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// DropboxStorage
// ---------------------------------------------------------------------------

const UPLOAD_URL: &str = "https://content.dropboxapi.com/2/files/upload";

/// Dropbox-backed [`Storage`] implementation.
///
/// Without a token every upload is a logged no-op — converted files stay in
/// the local processing directory and nothing fails.
pub struct DropboxStorage {
    client: reqwest::Client,
    token: Option<String>,
}

impl DropboxStorage {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: config.token.clone(),
        }
    }

    fn dest_path(dest_dir: &str, file: &Path) -> Result<String, StorageError> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::NoFileName(file.display().to_string()))?;
        Ok(format!("{}/{}", dest_dir.trim_end_matches('/'), name))
    }
}

#[async_trait]
impl Storage for DropboxStorage {
    async fn upload(&self, file: &Path, dest_dir: &str) -> Result<(), StorageError> {
        let Some(token) = &self.token else {
            log::info!(
                "no storage token configured - keeping {} local",
                file.display()
            );
            return Ok(());
        };

        let dest = Self::dest_path(dest_dir, file)?;
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|source| StorageError::Read {
                path: file.display().to_string(),
                source,
            })?;

        let arg = serde_json::json!({
            "path": dest,
            "mode": "add",
            "autorename": true,
        });

        let response = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(token)
            .header("Dropbox-API-Arg", arg.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Status(response.status().as_u16()));
        }

        log::info!("uploaded {} to {}", file.display(), dest);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_config(token: Option<&str>) -> StorageConfig {
        StorageConfig {
            default_dir: "/default".into(),
            token: token.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn upload_without_token_is_a_noop() {
        let storage = DropboxStorage::from_config(&make_config(None));
        let missing = PathBuf::from("/nonexistent/take.mp3");
        storage
            .upload(&missing, "/gigs/7")
            .await
            .expect("no token must not error even for a missing file");
    }

    #[test]
    fn dest_path_joins_dir_and_file_name() {
        let dest =
            DropboxStorage::dest_path("/gigs/7", Path::new("/tmp/2026-08-28_21-00.mp3")).unwrap();
        assert_eq!(dest, "/gigs/7/2026-08-28_21-00.mp3");
    }

    #[test]
    fn dest_path_tolerates_trailing_slash() {
        let dest = DropboxStorage::dest_path("/default/", Path::new("take.mp3")).unwrap();
        assert_eq!(dest, "/default/take.mp3");
    }

    #[test]
    fn dest_path_rejects_nameless_source() {
        let err = DropboxStorage::dest_path("/default", Path::new("/")).unwrap_err();
        assert!(matches!(err, StorageError::NoFileName(_)));
    }
}

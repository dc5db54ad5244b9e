//! Where and how the next finished take should be delivered.

use serde::Deserialize;

/// Destination and identity metadata for the take being captured or
/// processed.
///
/// Owned exclusively by the [`crate::session::SessionRecorder`] and
/// replaced wholesale on each recording start — never mutated field by
/// field. Post-processing receives a by-value snapshot so a context change
/// during a previous session's pipeline cannot corrupt it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionContext {
    /// Upload destination directory in cloud storage.
    pub upload_path: String,
    /// Human-readable session title, when the API provides one.
    pub title: Option<String>,
    /// Remote session id; required for the completion notification.
    pub id: Option<i64>,
}

impl SessionContext {
    /// The standalone fallback: default upload destination, no identity.
    pub fn local_default(upload_dir: &str) -> Self {
        Self {
            upload_path: upload_dir.to_string(),
            title: None,
            id: None,
        }
    }
}

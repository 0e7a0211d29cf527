//! Error types for the search admin client and the snapshot sequence.

use thiserror::Error;

use crate::index::IndexName;

/// Failure of a single administrative HTTP call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// The request never produced a response (connect error, TLS, timeout).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The cluster answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

impl AdminError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AdminError::Status { status, .. } => Some(*status),
            AdminError::Transport { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            AdminError::Status { body, .. } => Some(body),
            AdminError::Transport { .. } => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            AdminError::Transport { url, .. } | AdminError::Status { url, .. } => url,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        AdminError::Transport {
            url: url.to_string(),
            message,
        }
    }
}

/// Outcome of a failed snapshot run.
///
/// Variants are ordered by the step that failed. The source index state after
/// each one:
/// - `FreezeFailed`: untouched.
/// - `CloneFailed`: writable again unless `unfreeze` carries an error.
/// - `UnfreezeFailed`: left read-only.
/// - `CloneNotReady`: writable; the clone exists but was not healthy in time.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("could not set {index} read-only: {cause}")]
    FreezeFailed { index: IndexName, cause: AdminError },

    #[error(
        "could not clone {source_index} into {snapshot_index}: {cause}{}",
        unfreeze_note(.unfreeze)
    )]
    CloneFailed {
        source_index: IndexName,
        snapshot_index: IndexName,
        cause: AdminError,
        /// Result of the best-effort unfreeze that follows a failed clone.
        unfreeze: Result<(), AdminError>,
    },

    #[error(
        "{index} is still read-only, unfreeze failed: {cause}. Restore writes manually with \
         PUT {index}/_settings {{\"settings\": {{\"index.blocks.write\": false}}}}"
    )]
    UnfreezeFailed { index: IndexName, cause: AdminError },

    #[error("clone {index} did not become ready: {cause}")]
    CloneNotReady { index: IndexName, cause: AdminError },
}

fn unfreeze_note(unfreeze: &Result<(), AdminError>) -> String {
    match unfreeze {
        Ok(()) => " (source index was made writable again)".to_string(),
        Err(e) => format!(
            " (unfreeze ALSO failed, source index is still read-only and needs manual \
             remediation: {e})"
        ),
    }
}

impl SnapshotError {
    /// Process exit code for the CLI. 2 is left to clap for usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            SnapshotError::FreezeFailed { .. } => 3,
            SnapshotError::CloneFailed { .. } => 4,
            SnapshotError::UnfreezeFailed { .. } => 5,
            SnapshotError::CloneNotReady { .. } => 6,
        }
    }

    /// The admin call failure that ended the run.
    pub fn cause(&self) -> &AdminError {
        match self {
            SnapshotError::FreezeFailed { cause, .. }
            | SnapshotError::CloneFailed { cause, .. }
            | SnapshotError::UnfreezeFailed { cause, .. }
            | SnapshotError::CloneNotReady { cause, .. } => cause,
        }
    }

    /// Whether the source index was left with writes blocked.
    pub fn source_left_frozen(&self) -> bool {
        match self {
            SnapshotError::FreezeFailed { .. } | SnapshotError::CloneNotReady { .. } => false,
            SnapshotError::CloneFailed { unfreeze, .. } => unfreeze.is_err(),
            SnapshotError::UnfreezeFailed { .. } => true,
        }
    }
}

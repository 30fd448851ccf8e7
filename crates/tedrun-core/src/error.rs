//! Error types for subject processing.
//!
//! Every variant is fatal to the whole subject run; nothing is caught
//! and retried internally. The only resume mechanism is the
//! skip-if-output-exists check each pipeline stage performs.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TedrunError {
    #[error("subject directory does not exist: {}", .0.display())]
    SubjectNotFound(PathBuf),

    #[error("JSON sidecar not found: {}", .0.display())]
    MissingSidecar(PathBuf),

    #[error("EchoTime missing or not numeric in {}", .0.display())]
    MissingTimingValue(PathBuf),

    #[error("transform file not found: {}", .0.display())]
    MissingTransformArtifact(PathBuf),

    #[error("run '{key}' must have exactly 3 echoes, but found {actual}")]
    EchoCountMismatch { key: String, actual: usize },

    #[error("combined output not found after combination: {}", .0.display())]
    CombinationOutputMissing(PathBuf),

    #[error("antsApplyTransforms failed with exit code {exit_code}: {stderr}")]
    ProjectionFailed { exit_code: i32, stderr: String },

    #[error("failed to create output directory: {}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("unreadable JSON sidecar {}", .path.display())]
    SidecarParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for subject processing.
pub type Result<T> = std::result::Result<T, TedrunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_count_message_names_run_and_count() {
        let err = TedrunError::EchoCountMismatch {
            key: "sub-01_task-rest_run-1".to_string(),
            actual: 2,
        };
        let message = err.to_string();
        assert!(message.contains("sub-01_task-rest_run-1"));
        assert!(message.contains('2'));
    }

    #[test]
    fn test_missing_transform_names_expected_path() {
        let err = TedrunError::MissingTransformArtifact(PathBuf::from("/data/anat/xfm.h5"));
        assert!(err.to_string().contains("/data/anat/xfm.h5"));
    }
}

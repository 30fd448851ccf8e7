//! Echo metadata resolution from JSON sidecars.

use crate::error::{Result, TedrunError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One echo acquisition: the data file plus the timing value read from
/// its sidecar. Immutable once constructed; owned by its run group.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoInfo {
    /// Path to the echo's `.nii.gz` data file.
    pub file_path: PathBuf,

    /// Echo time in seconds, read from the sidecar.
    pub echo_time: f64,

    /// Path to the JSON sidecar the echo time came from.
    pub sidecar_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SidecarMetadata {
    // Kept as a raw value so a malformed entry (e.g. a quoted number)
    // reports MissingTimingValue rather than a whole-file parse error.
    #[serde(rename = "EchoTime", default)]
    echo_time: Option<serde_json::Value>,
}

/// Derive the sidecar path for an echo file: same stem, `.json` in
/// place of `.nii.gz`.
pub fn sidecar_path_for(echo_file: &Path) -> PathBuf {
    let name = echo_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".nii.gz").unwrap_or(&name);
    echo_file.with_file_name(format!("{stem}.json"))
}

/// Read the sidecar of `echo_file` and build its [`EchoInfo`].
///
/// Fails with [`TedrunError::MissingSidecar`] when the sidecar file is
/// absent and [`TedrunError::MissingTimingValue`] when its `EchoTime`
/// field is missing, null, or not numeric.
pub fn resolve_echo_info(echo_file: &Path) -> Result<EchoInfo> {
    let sidecar_path = sidecar_path_for(echo_file);
    if !sidecar_path.exists() {
        return Err(TedrunError::MissingSidecar(sidecar_path));
    }

    let raw = std::fs::read_to_string(&sidecar_path)?;
    let metadata: SidecarMetadata =
        serde_json::from_str(&raw).map_err(|source| TedrunError::SidecarParse {
            path: sidecar_path.clone(),
            source,
        })?;

    let echo_time = metadata
        .echo_time
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| TedrunError::MissingTimingValue(sidecar_path.clone()))?;

    Ok(EchoInfo {
        file_path: echo_file.to_path_buf(),
        echo_time,
        sidecar_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path_replaces_double_extension() {
        let path = sidecar_path_for(Path::new(
            "/data/sub-01/func/sub-01_task-rest_echo-1_desc-preproc_bold.nii.gz",
        ));
        assert_eq!(
            path,
            PathBuf::from("/data/sub-01/func/sub-01_task-rest_echo-1_desc-preproc_bold.json")
        );
    }

    #[test]
    fn test_resolve_reads_echo_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let echo = dir.path().join("sub-01_echo-1_desc-preproc_bold.nii.gz");
        std::fs::write(&echo, b"nifti").unwrap();
        std::fs::write(
            dir.path().join("sub-01_echo-1_desc-preproc_bold.json"),
            r#"{"EchoTime": 0.013, "RepetitionTime": 1.5}"#,
        )
        .unwrap();

        let info = resolve_echo_info(&echo).expect("resolve failed");
        assert_eq!(info.echo_time, 0.013);
        assert_eq!(info.file_path, echo);
    }

    #[test]
    fn test_missing_sidecar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let echo = dir.path().join("sub-01_echo-1_desc-preproc_bold.nii.gz");
        std::fs::write(&echo, b"nifti").unwrap();

        let err = resolve_echo_info(&echo).unwrap_err();
        assert!(matches!(err, TedrunError::MissingSidecar(_)));
    }

    #[test]
    fn test_missing_echo_time_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let echo = dir.path().join("sub-01_echo-1_desc-preproc_bold.nii.gz");
        std::fs::write(&echo, b"nifti").unwrap();
        std::fs::write(
            dir.path().join("sub-01_echo-1_desc-preproc_bold.json"),
            r#"{"RepetitionTime": 1.5}"#,
        )
        .unwrap();

        let err = resolve_echo_info(&echo).unwrap_err();
        assert!(matches!(err, TedrunError::MissingTimingValue(_)));
    }

    #[test]
    fn test_non_numeric_echo_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let echo = dir.path().join("sub-01_echo-1_desc-preproc_bold.nii.gz");
        std::fs::write(&echo, b"nifti").unwrap();
        std::fs::write(
            dir.path().join("sub-01_echo-1_desc-preproc_bold.json"),
            r#"{"EchoTime": "0.013"}"#,
        )
        .unwrap();

        let err = resolve_echo_info(&echo).unwrap_err();
        assert!(matches!(err, TedrunError::MissingTimingValue(_)));
    }

    #[test]
    fn test_null_echo_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let echo = dir.path().join("sub-01_echo-1_desc-preproc_bold.nii.gz");
        std::fs::write(&echo, b"nifti").unwrap();
        std::fs::write(
            dir.path().join("sub-01_echo-1_desc-preproc_bold.json"),
            r#"{"EchoTime": null}"#,
        )
        .unwrap();

        let err = resolve_echo_info(&echo).unwrap_err();
        assert!(matches!(err, TedrunError::MissingTimingValue(_)));
    }
}

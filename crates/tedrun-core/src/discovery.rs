//! Discovery and grouping of per-echo BOLD files into runs.

use crate::error::{Result, TedrunError};
use crate::key::run_key_for;
use crate::sidecar::{resolve_echo_info, EchoInfo};
use crate::transforms::{resolve_transforms, TransformSet};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Filename suffix of preprocessed BOLD echo files.
pub const ECHO_FILE_SUFFIX: &str = "_desc-preproc_bold.nii.gz";

/// All echo files of one run, with its shared transform set.
///
/// `echoes` is sorted ascending by echo time; the sequence order is
/// what gets passed positionally to the combination tool.
#[derive(Debug, Clone)]
pub struct RunGroup {
    /// Grouping key (e.g. `sub-01_task-rest_run-1`).
    pub key: String,

    /// Echo descriptors, ascending by `echo_time`.
    pub echoes: Vec<EchoInfo>,

    /// Transform files shared by all echoes of this run.
    pub transforms: TransformSet,
}

fn is_echo_file(filename: &str) -> bool {
    filename.contains("_echo-") && filename.ends_with(ECHO_FILE_SUFFIX)
}

/// Recursively enumerate all echo files under the subject directory.
///
/// Fails with [`TedrunError::SubjectNotFound`] when the directory does
/// not exist. Enumeration order is not guaranteed.
pub fn find_echo_files(subject_dir: &Path) -> Result<Vec<PathBuf>> {
    if !subject_dir.is_dir() {
        return Err(TedrunError::SubjectNotFound(subject_dir.to_path_buf()));
    }

    let echo_files: Vec<PathBuf> = WalkDir::new(subject_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_echo_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();

    Ok(echo_files)
}

/// Stable ascending sort by echo time; ties keep their current order.
pub fn sort_by_echo_time(echoes: &mut [EchoInfo]) {
    echoes.sort_by(|a, b| {
        a.echo_time
            .partial_cmp(&b.echo_time)
            .unwrap_or(Ordering::Equal)
    });
}

/// Discover all echo files for a subject and group them into runs.
///
/// Two-phase: the first pass derives keys and echo descriptors only,
/// the second resolves each key's transform set exactly once and sorts
/// the group's echoes. Traversal order therefore cannot influence the
/// result (every echo of a run resolves to identical transform paths).
///
/// Echo counts are not validated here; that is the orchestrator's job.
pub fn discover_run_groups(subject_dir: &Path) -> Result<BTreeMap<String, RunGroup>> {
    let echo_files = find_echo_files(subject_dir)?;
    info!(
        count = echo_files.len(),
        subject = %subject_dir.display(),
        "found echo files"
    );

    // Phase one: keys and descriptors, no transform lookups yet.
    let mut keyed: BTreeMap<String, Vec<EchoInfo>> = BTreeMap::new();
    let mut first_seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    for echo_file in echo_files {
        let filename = echo_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = run_key_for(&filename);
        let echo_info = resolve_echo_info(&echo_file)?;

        first_seen.entry(key.clone()).or_insert_with(|| echo_file.clone());
        keyed.entry(key).or_default().push(echo_info);
    }

    // Phase two: one transform resolution per key, then sort echoes.
    let mut run_groups = BTreeMap::new();
    for (key, mut echoes) in keyed {
        let transforms = resolve_transforms(&first_seen[&key], subject_dir)?;
        sort_by_echo_time(&mut echoes);
        run_groups.insert(
            key.clone(),
            RunGroup {
                key,
                echoes,
                transforms,
            },
        );
    }

    Ok(run_groups)
}

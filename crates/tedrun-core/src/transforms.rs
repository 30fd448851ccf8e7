//! Resolution of the spatial-transform files attached to each run.

use crate::error::{Result, TedrunError};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Filename suffix of the subject-level T1w-to-MNI transform.
pub const T1W_TO_MNI_SUFFIX: &str = "_from-T1w_to-MNI152NLin2009cAsym_mode-image_xfm.h5";

/// Transform files shared by all echoes of a run.
///
/// All four paths are verified to exist at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSet {
    /// BOLD-reference to T1w coregistration transform.
    pub bold_to_t1w: PathBuf,

    /// BOLD reference image in T1w space (resampling grid).
    pub t1w_reference: PathBuf,

    /// BOLD reference image in MNI space (resampling grid).
    pub mni_reference: PathBuf,

    /// Subject-level T1w to MNI152NLin2009cAsym transform.
    pub t1w_to_mni: PathBuf,
}

/// Resolve the transform set for the run that `echo_file` belongs to.
///
/// Any echo of a run resolves to the same set: the three run-level
/// files are derived from the filename truncated at its `_echo` marker,
/// and the fourth is a subject-level artifact found under an `anat`
/// directory in the subject tree.
pub fn resolve_transforms(echo_file: &Path, subject_dir: &Path) -> Result<TransformSet> {
    let name = echo_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base_name = name.split("_echo").next().unwrap_or(&name).to_string();
    let file_dir = echo_file.parent().unwrap_or_else(|| Path::new("."));

    let bold_to_t1w = expect_sibling(
        file_dir,
        &format!("{base_name}_from-boldref_to-T1w_mode-image_desc-coreg_xfm.txt"),
    )?;
    let t1w_reference = expect_sibling(file_dir, &format!("{base_name}_space-T1w_boldref.nii.gz"))?;
    let mni_reference = expect_sibling(
        file_dir,
        &format!("{base_name}_space-MNI152NLin2009cAsym_res-2_boldref.nii.gz"),
    )?;
    let t1w_to_mni = find_t1w_to_mni(subject_dir)?;

    Ok(TransformSet {
        bold_to_t1w,
        t1w_reference,
        mni_reference,
        t1w_to_mni,
    })
}

fn expect_sibling(dir: &Path, filename: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    if !path.exists() {
        return Err(TedrunError::MissingTransformArtifact(path));
    }
    Ok(path)
}

/// Search the subject tree for the T1w-to-MNI transform inside an
/// `anat` directory.
///
/// When several files match (e.g. longitudinal sessions), candidates
/// are sorted lexicographically and the first is used, with a warning
/// naming every candidate.
fn find_t1w_to_mni(subject_dir: &Path) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = WalkDir::new(subject_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let in_anat = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map(|d| d == "anat")
                .unwrap_or(false);
            in_anat && entry.file_name().to_string_lossy().ends_with(T1W_TO_MNI_SUFFIX)
        })
        .map(|entry| entry.into_path())
        .collect();

    if matches.is_empty() {
        return Err(TedrunError::MissingTransformArtifact(
            subject_dir.join("anat").join(format!("*{T1W_TO_MNI_SUFFIX}")),
        ));
    }

    matches.sort();
    if matches.len() > 1 {
        warn!(
            candidates = ?matches,
            chosen = %matches[0].display(),
            "multiple T1w-to-MNI transforms found, using the lexicographically first"
        );
    }
    Ok(matches.swap_remove(0))
}

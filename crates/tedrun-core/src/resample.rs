//! Spatial projection stage: resample one image into a target space.

use crate::error::{Result, TedrunError};
use crate::tools::ResampleTool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Project `input` onto the grid of `reference`, composing `transforms`
/// in the given order (not commutative), writing to `output_path`.
///
/// Idempotent: an existing output is returned unchanged with a warning.
pub async fn project(
    input: &Path,
    output_path: &Path,
    transforms: &[PathBuf],
    reference: &Path,
    resampler: &dyn ResampleTool,
) -> Result<PathBuf> {
    if output_path.exists() {
        warn!(output = %output_path.display(), "skipping existing file");
        return Ok(output_path.to_path_buf());
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| {
            TedrunError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source,
            }
        })?;
    }

    info!(
        output = %output_path.display(),
        transforms = transforms.len(),
        "applying transforms"
    );
    resampler.resample(input, reference, transforms, output_path).await?;

    Ok(output_path.to_path_buf())
}

//! Echo-combination stage: optional trim, combine, verify output.

use crate::discovery::RunGroup;
use crate::error::{Result, TedrunError};
use crate::tools::{CombineTool, TrimTool};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Filename the combination tool is declared to write in its output dir.
pub const COMBINED_OUTPUT_NAME: &str = "desc-optcom_bold.nii.gz";

/// Output directory for one run's combination stage.
pub fn combined_output_dir(output_root: &Path, run_key: &str) -> PathBuf {
    output_root
        .join("tedana_combined")
        .join(format!("{run_key}_rec-tedana"))
}

/// Temporary per-echo artifacts, removed when the guard leaves scope.
///
/// Paths are registered before their files are written, so partial
/// artifacts from a failed trim are removed too. Removal failures are
/// logged, never raised: the error already in flight wins.
struct TempSeries {
    files: Vec<PathBuf>,
}

impl TempSeries {
    fn new() -> Self {
        Self { files: Vec::new() }
    }

    fn register(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    fn paths(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Drop for TempSeries {
    fn drop(&mut self) {
        for file in &self.files {
            if file.exists() {
                if let Err(error) = std::fs::remove_file(file) {
                    warn!(file = %file.display(), %error, "failed to remove temporary echo file");
                }
            }
        }
    }
}

/// Run the combination stage for one run group.
///
/// Idempotent: when the declared output already exists the stage is
/// skipped entirely. With `trim_volumes > 0` each echo is first trimmed
/// into a run-scoped temporary (one echo at a time, keeping peak memory
/// bounded to a single image) and the combination tool runs against the
/// temporaries; they are removed on success and on every failure path.
/// Original echo files are never deleted.
pub async fn run_combination(
    group: &RunGroup,
    trim_volumes: u32,
    trimmer: &dyn TrimTool,
    combiner: &dyn CombineTool,
    output_root: &Path,
) -> Result<PathBuf> {
    let out_dir = combined_output_dir(output_root, &group.key);
    std::fs::create_dir_all(&out_dir).map_err(|source| TedrunError::DirectoryCreationFailed {
        path: out_dir.clone(),
        source,
    })?;

    let combined = out_dir.join(COMBINED_OUTPUT_NAME);
    if combined.exists() {
        info!(run = %group.key, "combined output already exists, skipping");
        return Ok(combined);
    }

    let echo_times: Vec<f64> = group.echoes.iter().map(|e| e.echo_time).collect();

    if trim_volumes > 0 {
        let mut temporaries = TempSeries::new();
        for (index, echo) in group.echoes.iter().enumerate() {
            info!(
                run = %group.key,
                echo = index + 1,
                total = group.echoes.len(),
                "trimming echo"
            );
            let trimmed = out_dir.join(format!("temp_echo-{:02}_trimmed.nii.gz", index + 1));
            temporaries.register(trimmed.clone());
            trimmer.trim(&echo.file_path, trim_volumes, &trimmed).await?;
        }

        info!(
            run = %group.key,
            echoes = temporaries.paths().len(),
            "running combination on trimmed echoes"
        );
        combiner.combine(temporaries.paths(), &echo_times, &out_dir).await?;
        drop(temporaries);
    } else {
        let sources: Vec<PathBuf> = group.echoes.iter().map(|e| e.file_path.clone()).collect();
        info!(run = %group.key, echoes = sources.len(), "running combination");
        combiner.combine(&sources, &echo_times, &out_dir).await?;
    }

    // Invocation success alone does not certify completion.
    if !combined.exists() {
        return Err(TedrunError::CombinationOutputMissing(combined));
    }
    Ok(combined)
}

//! Subject-level orchestration of the combination and projection stages.

use crate::combine::run_combination;
use crate::discovery::{discover_run_groups, RunGroup};
use crate::error::{Result, TedrunError};
use crate::resample::project;
use crate::tools::{
    AntsApplyTransforms, CombineTool, FslroiCommand, ResampleTool, T2smapCommand, TrimTool,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Every run must carry exactly this many echoes.
pub const REQUIRED_ECHO_COUNT: usize = 3;

/// Artifact locations produced for one successfully processed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Optimally combined BOLD series in native space.
    pub combined: PathBuf,

    /// Combined series projected into T1w space.
    pub t1w: PathBuf,

    /// Combined series projected into MNI152NLin2009cAsym space.
    pub mni: PathBuf,
}

/// Drives the full pipeline for one subject.
///
/// Runs are processed strictly one at a time; each run's transient
/// artifacts are released before the next run begins, keeping peak
/// resident memory bounded to a single run's working set.
pub struct Processor {
    fmriprep_dir: PathBuf,
    output_dir: PathBuf,
    subject_id: String,
    trim_volumes: u32,
    trimmer: Arc<dyn TrimTool>,
    combiner: Arc<dyn CombineTool>,
    resampler: Arc<dyn ResampleTool>,
}

impl Processor {
    /// Build a processor with explicit tool implementations.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fmriprep_dir: PathBuf,
        output_dir: PathBuf,
        subject_id: &str,
        trim_volumes: u32,
        trimmer: Arc<dyn TrimTool>,
        combiner: Arc<dyn CombineTool>,
        resampler: Arc<dyn ResampleTool>,
    ) -> Self {
        Self {
            fmriprep_dir,
            output_dir,
            subject_id: normalize_subject_id(subject_id),
            trim_volumes,
            trimmer,
            combiner,
            resampler,
        }
    }

    /// Build a processor backed by the real command-line tools.
    ///
    /// `apptainer_image` switches `antsApplyTransforms` to the
    /// container-bound invocation.
    pub fn with_command_tools(
        fmriprep_dir: PathBuf,
        output_dir: PathBuf,
        subject_id: &str,
        trim_volumes: u32,
        apptainer_image: Option<String>,
    ) -> Self {
        Self::new(
            fmriprep_dir,
            output_dir,
            subject_id,
            trim_volumes,
            Arc::new(FslroiCommand),
            Arc::new(T2smapCommand),
            Arc::new(AntsApplyTransforms::new(apptainer_image)),
        )
    }

    /// Normalized subject id (`sub-` prefixed).
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Process every run of the subject and return one result per run.
    ///
    /// Fails fast: the first error on any run aborts the whole
    /// invocation. A later re-invocation resumes past completed stages
    /// through their existence checks.
    pub async fn process(&self) -> Result<BTreeMap<String, RunResult>> {
        info!(subject = %self.subject_id, "processing subject");

        std::fs::create_dir_all(&self.output_dir).map_err(|source| {
            TedrunError::DirectoryCreationFailed {
                path: self.output_dir.clone(),
                source,
            }
        })?;

        let subject_dir = self.fmriprep_dir.join(&self.subject_id);
        let run_groups = discover_run_groups(&subject_dir)?;

        for (key, group) in &run_groups {
            if group.echoes.len() != REQUIRED_ECHO_COUNT {
                return Err(TedrunError::EchoCountMismatch {
                    key: key.clone(),
                    actual: group.echoes.len(),
                });
            }
        }

        info!(
            runs = run_groups.len(),
            echoes_per_run = REQUIRED_ECHO_COUNT,
            "validated run groups"
        );

        let mut results = BTreeMap::new();
        for (index, (key, group)) in run_groups.iter().enumerate() {
            info!(
                run = %key,
                position = index + 1,
                total = run_groups.len(),
                "processing run"
            );

            let combined = run_combination(
                group,
                self.trim_volumes,
                self.trimmer.as_ref(),
                self.combiner.as_ref(),
                &self.output_dir,
            )
            .await?;

            let (t1w, mni) = self.project_outputs(&combined, group).await?;

            results.insert(key.clone(), RunResult { combined, t1w, mni });
            info!(run = %key, "completed run");
        }

        Ok(results)
    }

    async fn project_outputs(
        &self,
        combined: &Path,
        group: &RunGroup,
    ) -> Result<(PathBuf, PathBuf)> {
        let key = &group.key;
        let transforms = &group.transforms;
        let output_base = self.output_dir.join("transformed").join(key);

        let t1w_output = output_base.join(format!("{key}_space-T1w_desc-optcom_bold.nii.gz"));
        let t1w = project(
            combined,
            &t1w_output,
            std::slice::from_ref(&transforms.bold_to_t1w),
            &transforms.t1w_reference,
            self.resampler.as_ref(),
        )
        .await?;

        // Transforms compose right-to-left: BOLD-to-T1w must apply
        // before T1w-to-MNI, so it comes last in the list.
        let mni_output = output_base.join(format!(
            "{key}_space-MNI152NLin2009cAsym_desc-optcom_bold.nii.gz"
        ));
        let mni = project(
            combined,
            &mni_output,
            &[transforms.t1w_to_mni.clone(), transforms.bold_to_t1w.clone()],
            &transforms.mni_reference,
            self.resampler.as_ref(),
        )
        .await?;

        Ok((t1w, mni))
    }
}

fn normalize_subject_id(subject_id: &str) -> String {
    if subject_id.starts_with("sub-") {
        subject_id.to_string()
    } else {
        format!("sub-{subject_id}")
    }
}

//! External tool seams and their process-backed implementations.
//!
//! The numerical work — echo combination, volume trimming, sinc
//! resampling — happens in external programs. Each capability is a
//! trait so tests can substitute capturing stubs; the shipped
//! implementations spawn the real binaries.

use crate::error::{Result, TedrunError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Echo-combination capability (tedana).
///
/// `echoes` and `echo_times` are parallel, ordered lists; the tool is
/// declared to write `desc-optcom_bold.nii.gz` inside `out_dir`.
/// Success is certified by the caller checking that file's existence,
/// not by the call returning `Ok` alone.
#[async_trait]
pub trait CombineTool: Send + Sync {
    async fn combine(&self, echoes: &[PathBuf], echo_times: &[f64], out_dir: &Path) -> Result<()>;
}

/// Leading-volume trimming capability.
#[async_trait]
pub trait TrimTool: Send + Sync {
    /// Write `input` minus its first `drop_volumes` temporal samples
    /// to `output`.
    async fn trim(&self, input: &Path, drop_volumes: u32, output: &Path) -> Result<()>;
}

/// Spatial resampling capability (ANTs).
#[async_trait]
pub trait ResampleTool: Send + Sync {
    /// Resample `input` onto the grid of `reference`, composing
    /// `transforms` in the given order. The input is treated as a
    /// volume time series, not independent 3-D fields.
    async fn resample(
        &self,
        input: &Path,
        reference: &Path,
        transforms: &[PathBuf],
        output: &Path,
    ) -> Result<()>;
}

async fn capture(mut command: Command) -> Result<Output> {
    let child = command.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    Ok(child.wait_with_output().await?)
}

fn check_exit(tool: &str, output: Output) -> Result<()> {
    if !output.status.success() {
        return Err(TedrunError::ToolFailed {
            tool: tool.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Combines echoes by spawning tedana's `t2smap` CLI.
pub struct T2smapCommand;

#[async_trait]
impl CombineTool for T2smapCommand {
    async fn combine(&self, echoes: &[PathBuf], echo_times: &[f64], out_dir: &Path) -> Result<()> {
        let mut command = Command::new("t2smap");
        command.arg("-d");
        for echo in echoes {
            command.arg(echo);
        }
        command.arg("-e");
        for echo_time in echo_times {
            command.arg(echo_time.to_string());
        }
        command.arg("--out-dir").arg(out_dir);

        debug!(out_dir = %out_dir.display(), echoes = echoes.len(), "spawning t2smap");
        check_exit("t2smap", capture(command).await?)
    }
}

/// Trims leading volumes by spawning FSL's `fslroi`.
pub struct FslroiCommand;

#[async_trait]
impl TrimTool for FslroiCommand {
    async fn trim(&self, input: &Path, drop_volumes: u32, output: &Path) -> Result<()> {
        // fslroi <input> <output> <tmin> <tsize>; -1 keeps the rest.
        let mut command = Command::new("fslroi");
        command
            .arg(input)
            .arg(output)
            .arg(drop_volumes.to_string())
            .arg("-1");

        debug!(input = %input.display(), drop_volumes, "spawning fslroi");
        check_exit("fslroi", capture(command).await?)
    }
}

const ANTS_BIN_PATH: &str = "/opt/ants/bin";
const ANTS_LIB_PATH: &str = "/opt/ants/lib";

/// Resamples images by spawning `antsApplyTransforms`.
///
/// With a container image configured, the process environment is
/// extended so the container-bound ANTs binaries and shared libraries
/// are found; otherwise the binary is taken from the ambient `PATH`.
pub struct AntsApplyTransforms {
    container_image: Option<String>,
}

impl AntsApplyTransforms {
    pub fn new(container_image: Option<String>) -> Self {
        Self { container_image }
    }
}

#[async_trait]
impl ResampleTool for AntsApplyTransforms {
    async fn resample(
        &self,
        input: &Path,
        reference: &Path,
        transforms: &[PathBuf],
        output: &Path,
    ) -> Result<()> {
        let mut command = Command::new("antsApplyTransforms");

        if self.container_image.is_some() {
            let path = std::env::var("PATH").unwrap_or_default();
            command.env("PATH", format!("{ANTS_BIN_PATH}:{path}"));
            let ld_path = std::env::var("LD_LIBRARY_PATH").unwrap_or_default();
            command.env("LD_LIBRARY_PATH", format!("{ANTS_LIB_PATH}:{ld_path}"));
        }

        command
            .arg("--input")
            .arg(input)
            .arg("--reference-image")
            .arg(reference)
            .arg("--output")
            .arg(output)
            .arg("--interpolation")
            .arg("LanczosWindowedSinc")
            .arg("--input-image-type")
            .arg("3");
        for transform in transforms {
            command.arg("--transform").arg(transform);
        }

        debug!(output = %output.display(), transforms = transforms.len(), "spawning antsApplyTransforms");
        let process_output = capture(command).await?;
        if !process_output.status.success() {
            return Err(TedrunError::ProjectionFailed {
                exit_code: process_output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&process_output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

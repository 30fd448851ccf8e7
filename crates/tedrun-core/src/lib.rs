//! tedrun - multi-echo combination pipeline driver.
//!
//! Discovers multi-echo BOLD runs in fMRIPrep derivatives, groups the
//! per-echo files into runs, and drives a two-stage external pipeline
//! per run:
//!
//! 1. Echo combination via tedana's `t2smap` (with an optional leading
//!    volume trim beforehand).
//! 2. Spatial resampling of the combined series into T1w and
//!    MNI152NLin2009cAsym space via `antsApplyTransforms`.
//!
//! Every stage is idempotent: when its declared output already exists
//! the stage is skipped, so a re-invocation resumes past completed work.

pub mod combine;
pub mod discovery;
pub mod error;
pub mod key;
pub mod processor;
pub mod resample;
pub mod sidecar;
pub mod telemetry;
pub mod tools;
pub mod transforms;

// Re-export key types
pub use discovery::RunGroup;
pub use error::{Result, TedrunError};
pub use processor::{Processor, RunResult};
pub use sidecar::EchoInfo;
pub use tools::{AntsApplyTransforms, CombineTool, FslroiCommand, ResampleTool, T2smapCommand, TrimTool};
pub use transforms::TransformSet;

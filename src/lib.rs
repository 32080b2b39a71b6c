//! intraop - topup distortion correction for intraoperative fMRI
//!
//! The pipeline is a workflow graph of typed nodes wired port to port and
//! executed by a local scheduler. FSL tools (`mcflirt`, `fslmaths`,
//! `fslmerge`, `topup`, `applytopup`) run as subprocesses; the acquisition
//! parameters for topup are generated from the NIfTI header of the input.
//!
//! ## Example
//!
//! ```no_run
//! use intraop::engine::{Executor, Plugin};
//! use intraop::nodes::NodeRegistry;
//! use intraop::pipelines::topup::{bind_topup_inputs, corrected_image, make_w_topup};
//! use std::path::Path;
//!
//! # async fn run() -> intraop::Result<()> {
//! let mut workflow = make_w_topup()?;
//! bind_topup_inputs(&mut workflow, Path::new("func.nii.gz"), Path::new("fmap.nii.gz"))?;
//!
//! let executor = Executor::new(NodeRegistry::new(), "analysis").with_plugin(Plugin::MultiProc);
//! let execution = executor.run(&workflow).await?;
//! println!("{}", corrected_image(&execution)?.display());
//! # Ok(())
//! # }
//! ```
//!
//! Workflows can also be written in YAML:
//!
//! ```yaml
//! name: motion-only
//! nodes:
//!   - name: mcflirt
//!     type: fsl.mcflirt
//!     inputs:
//!       in_file: /data/func.nii.gz
//!   - name: mean
//!     type: fsl.mean_image
//!     inputs:
//!       dimension: T
//! connections:
//!   - { source: mcflirt, source_field: out_file, dest: mean, dest_field: in_file }
//! ```

pub mod acqparams;
pub mod config;
pub mod engine;
pub mod error;
pub mod make;
pub mod metrics;
pub mod nifti;
pub mod nodes;
pub mod pipelines;
pub mod shutdown;
pub mod telemetry;
pub mod workflow;

pub use error::{Error, Result};

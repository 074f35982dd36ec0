//! Cadence Workflow
//!
//! This crate provides the typed step graph of a workflow: ordered phases, each an
//! ordered list of phase steps, each an ordered list of steps.
//!
//! Key differences from `cadence-config`:
//! - Steps are a sum type ([`StepKind`]) instead of a type tag plus property bag
//! - Barrier steps carry their identifier directly
//! - Deployment pre-steps and post-steps are folded into ordinary phases

mod error;
mod step;
mod workflow;

pub use error::WorkflowError;
pub use step::{Step, StepKind};
pub use workflow::{
  POST_DEPLOYMENT_PHASE_ID, PRE_DEPLOYMENT_PHASE_ID, Phase, PhaseStep, Workflow,
};

//! Cadence Config
//!
//! This crate contains the serializable pipeline and workflow definitions as they
//! are stored by the pipeline engine. These types are read before any barrier
//! analysis takes place.
//!
//! Definitions can be loaded from:
//! - JSON files (via CLI with `cadence plan pipeline.json --workflows dir/`)
//! - Database storage (as JSON blobs)
//!
//! Steps are kept in their persisted shape here: a `type` tag plus a string-keyed
//! property bag. `cadence-workflow` turns them into a typed step graph.

mod pipeline;
mod step;
mod workflow;

pub use pipeline::{
  ENV_STATE_TYPE, PipelineDef, PipelineStageDef, StageElementDef, WORKFLOW_ID_PROPERTY,
};
pub use step::{BARRIER_IDENTIFIER_PROPERTY, BARRIER_STEP_TYPE, StepDef};
pub use workflow::{PhaseDef, PhaseStepDef, WorkflowDef};

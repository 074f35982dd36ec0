//! Barrier synchronization for Cadence pipelines.
//!
//! A barrier is a named rendezvous point declared by a `BARRIER` step in one
//! or more workflows that a pipeline launches concurrently. Every declaring
//! workflow must arrive before any of them may move past it.
//!
//! # Architecture
//!
//! ```text
//! BarrierCoordinator
//! ├── obtain_instances(app_id, batch, execution_id)
//! │   ├── scan()      - barrier declarations per workflow, in declared order
//! │   ├── validate()  - per-workflow uniqueness, then >= 2 participants
//! │   └── store.create_all()
//! ├── construct_barriers(pipeline, workflows, execution_id)
//! │   └── concurrent_batches() - parallel stages grouped into launch batches
//! ├── arrive(name, execution_id, workflow_id, pipeline_state_id) -> ArrivalStatus
//! └── get / save / list
//!
//! BarrierWaiter
//! └── wait(id) - polls until saturated or timed out
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cadence_barrier::BarrierCoordinator;
//! use cadence_store::MemoryStore;
//!
//! let coordinator = BarrierCoordinator::new(MemoryStore::new());
//! let created = coordinator.obtain_instances("app", &batch, "exec-1").await?;
//!
//! let status = coordinator.arrive("deploy", "exec-1", "wf-1", "state-1").await?;
//! if !status.is_saturated() {
//!     // suspend, then poll with BarrierWaiter
//! }
//! ```

mod config;
mod coordinator;
mod error;
mod launch;
mod scanner;
mod validator;
mod wait;

pub use config::{CoordinatorConfig, WaitConfig};
pub use coordinator::{ArrivalStatus, BarrierCoordinator, OrchestrationWorkflowInfo, plan};
pub use error::BarrierError;
pub use launch::{concurrent_batches, load_workflows};
pub use scanner::{BarrierDeclaration, BarrierLocation, scan};
pub use validator::{ValidatedBarrier, validate};
pub use wait::BarrierWaiter;

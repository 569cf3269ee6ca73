//! Modelo de jobs: `JobSpec`, `TaskSpec`, `JobRun`, `TaskRun`.

pub mod job;
pub mod run;
mod status;

pub use job::{Initiator, JobSpec, JobSpecRequest, TaskSpec};
pub use run::{trigger_key, JobRun, Lease, TaskRun};
pub use status::RunStatus;

use uuid::Uuid;

/// Identificador opaco (uuid v4 sin guiones). Nunca se reutiliza.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

//! oracle-core: modelo de jobs, service agreements y motor de ejecución.
pub mod adapter;
pub mod agreement;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod hashing;
pub mod model;
pub mod schedule;
pub mod store;

pub use adapter::{Adapter, AdapterRegistry};
pub use agreement::{Encumbrance, HmacSigner, ServiceAgreement, ServiceAgreementRequest, Signer};
pub use engine::{ExecutionEngine, RunQueue, WorkerPool};
pub use errors::{AdapterError, AgreementError, EngineError, ErrorDocument, JobError, ScheduleError, SignerError,
                 StoreError};
pub use model::{Initiator, JobRun, JobSpec, JobSpecRequest, Lease, RunStatus, TaskRun, TaskSpec};
pub use schedule::{CronParser, Scheduler, StandardCron, Tick, TriggerSource};
pub use store::{InMemoryStore, RunFilter, Store};

//! Ejecución de runs: motor secuencial por run + pool concurrente entre runs.

mod executor;
mod worker;

pub use executor::ExecutionEngine;
pub use worker::{RunQueue, WorkerPool};

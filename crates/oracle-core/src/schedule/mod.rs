//! Scheduler: cron / run-at / disparos explícitos.

mod parser;
mod scheduler;

pub use parser::{CronParser, StandardCron};
pub use scheduler::{Scheduler, Tick, TriggerSource};

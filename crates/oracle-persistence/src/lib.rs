//! oracle-persistence
//!
//! Implementación Postgres (Diesel + r2d2) del trait `Store` del núcleo, con
//! paridad 1:1 respecto a `InMemoryStore`.
//!
//! Módulos:
//! - `pg`: pool, reintentos y `PgStore`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_env, ConnectionProvider, PgPool, PgStore, PoolProvider};

//! Configuración del nodo.
//! Carga variables de entorno (.env una sola vez) en un `NodeConfig` inmutable.
//!
//! | Variable                        | Default | Uso                                   |
//! |---------------------------------|---------|---------------------------------------|
//! | `DATABASE_URL`                  | -       | Postgres; sin ella, store en memoria  |
//! | `DATABASE_MIN_CONNECTIONS`      | 2       | `min_idle` del pool                   |
//! | `DATABASE_MAX_CONNECTIONS`      | 16      | `max_size` del pool                   |
//! | `ORACLE_WORKER_CONCURRENCY`     | 4       | runs simultáneos                      |
//! | `ORACLE_SCHEDULER_INTERVAL_SECS`| 1       | periodo de tick del scheduler         |
//! | `ORACLE_SIGNER_SECRET`          | -       | clave HMAC para firmar agreements     |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use oracle_core::HmacSigner;
use oracle_persistence::DbConfig;

use crate::errors::ConfigError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// `None` => `InMemoryStore`.
    pub database: Option<DbConfig>,
    pub worker_concurrency: usize,
    pub scheduler_interval: Duration,
    pub signer_secret: Option<String>,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let database = match lookup("DATABASE_URL") {
            Some(url) if !url.trim().is_empty() => {
                Some(DbConfig { url,
                                min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", 2)?,
                                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 16)? })
            }
            _ => None,
        };
        let worker_concurrency = parse_or(&lookup, "ORACLE_WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY)?;
        if worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue { key: "ORACLE_WORKER_CONCURRENCY",
                                                   value: "0".into() });
        }
        let interval_secs = parse_or(&lookup, "ORACLE_SCHEDULER_INTERVAL_SECS", DEFAULT_SCHEDULER_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue { key: "ORACLE_SCHEDULER_INTERVAL_SECS",
                                                   value: "0".into() });
        }
        Ok(Self { database,
                  worker_concurrency,
                  scheduler_interval: Duration::from_secs(interval_secs),
                  signer_secret: lookup("ORACLE_SIGNER_SECRET").filter(|s| !s.is_empty()) })
    }

    /// Signer HMAC con `ORACLE_SIGNER_SECRET`.
    pub fn signer(&self) -> Result<HmacSigner, ConfigError> {
        let secret = self.signer_secret
                         .as_deref()
                         .ok_or(ConfigError::Missing("ORACLE_SIGNER_SECRET"))?;
        HmacSigner::new(secret).map_err(|e| ConfigError::Signer(e.to_string()))
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
    where T: FromStr,
          F: Fn(&str) -> Option<String>
{
    match lookup(key) {
        Some(raw) => raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

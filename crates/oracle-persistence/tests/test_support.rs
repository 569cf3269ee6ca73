use once_cell::sync::Lazy;
use oracle_persistence::config::DbConfig;
use oracle_persistence::pg::{build_pool, PgPool, PgStore, PoolProvider};

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 2) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

/// `None` (y el test se omite) si no hay `DATABASE_URL`.
pub fn test_store() -> Option<PgStore<PoolProvider>> {
    let pool = TEST_POOL.as_ref()?;
    Some(PgStore::new(PoolProvider { pool: pool.clone() }))
}

//! oracle-adapters: catálogo de adapters incorporados.
//!
//! Cada adapter implementa `oracle_core::Adapter` y se registra por nombre de
//! tipo en `default_registry()`. El núcleo no conoce ninguno de ellos: sólo
//! resuelve nombres contra el registro que el nodo construye al arrancar.
//!
//! Tipos registrados: `noop`, `httpGet`, `jsonParse`, `multiply`,
//! `ethUint256`, `ethBytes32`.

pub mod params;
pub mod tasks;

use oracle_core::AdapterRegistry;

use tasks::{EthBytes32, EthUint256, HttpGet, JsonParse, Multiply, NoOp};

/// Registro con todos los adapters incorporados.
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new().register("noop", NoOp)
                          .register("httpGet", HttpGet::default())
                          .register("jsonParse", JsonParse)
                          .register("multiply", Multiply)
                          .register("ethUint256", EthUint256)
                          .register("ethBytes32", EthBytes32)
}

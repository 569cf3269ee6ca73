//! Adapters incorporados.

pub mod eth_abi;
pub mod http_get;
pub mod json_parse;
pub mod multiply;
pub mod noop;

pub use eth_abi::{EthBytes32, EthUint256};
pub use http_get::HttpGet;
pub use json_parse::JsonParse;
pub use multiply::Multiply;
pub use noop::NoOp;

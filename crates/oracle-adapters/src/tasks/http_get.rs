//! `httpGet`: GET a `endpoint`, el body como string.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use oracle_core::{Adapter, AdapterError};

use crate::params::parse_params;

#[derive(Debug, Deserialize)]
struct HttpGetParams {
    endpoint: String,
}

#[derive(Debug, Clone, Default)]
pub struct HttpGet {
    client: reqwest::Client,
}

impl HttpGet {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for HttpGet {
    async fn perform(&self, _input: &Value, params: &Map<String, Value>) -> Result<Value, AdapterError> {
        let HttpGetParams { endpoint } = parse_params(params)?;
        debug!("httpGet {}", endpoint);

        let resp = self.client
                       .get(&endpoint)
                       .send()
                       .await
                       .map_err(|e| AdapterError::Execution(format!("GET {endpoint}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Execution(format!("GET {endpoint} returned {status}")));
        }
        let body = resp.text()
                       .await
                       .map_err(|e| AdapterError::Execution(format!("GET {endpoint}: {e}")))?;
        Ok(Value::String(body))
    }
}

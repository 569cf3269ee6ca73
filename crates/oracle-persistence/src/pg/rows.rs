//! Filas Diesel y conversión documento ↔ fila.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use oracle_core::{JobRun, JobSpec, ServiceAgreement};

use crate::error::PersistenceError;
use crate::schema::{job_runs, job_specs, service_agreements};

#[derive(Queryable, Insertable, AsChangeset, Debug)]
#[diesel(table_name = job_specs)]
pub struct JobSpecRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub document: Value,
}

impl JobSpecRow {
    pub fn from_spec(spec: &JobSpec) -> Result<Self, PersistenceError> {
        Ok(Self { id: spec.id.clone(),
                  created_at: spec.created_at,
                  document: serde_json::to_value(spec)? })
    }

    pub fn into_spec(self) -> Result<JobSpec, PersistenceError> {
        Ok(serde_json::from_value(self.document)?)
    }
}

#[derive(Queryable, Insertable, AsChangeset, Debug)]
#[diesel(table_name = job_runs, treat_none_as_null = true)]
pub struct JobRunRow {
    pub id: String,
    pub job_spec_id: String,
    pub status: String,
    pub trigger_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub document: Value,
}

impl JobRunRow {
    pub fn from_run(run: &JobRun) -> Result<Self, PersistenceError> {
        Ok(Self { id: run.id.clone(),
                  job_spec_id: run.job_spec_id.clone(),
                  status: run.status.as_str().to_string(),
                  trigger_key: run.trigger_key.clone(),
                  created_at: run.created_at,
                  document: serde_json::to_value(run)? })
    }

    pub fn into_run(self) -> Result<JobRun, PersistenceError> {
        Ok(serde_json::from_value(self.document)?)
    }
}

#[derive(Queryable, Insertable, Debug)]
#[diesel(table_name = service_agreements)]
pub struct ServiceAgreementRow {
    pub id: String,
    pub job_spec_id: String,
    pub created_at: DateTime<Utc>,
    pub document: Value,
}

impl ServiceAgreementRow {
    pub fn from_agreement(agreement: &ServiceAgreement) -> Result<Self, PersistenceError> {
        Ok(Self { id: agreement.id.clone(),
                  job_spec_id: agreement.job_spec_id.clone(),
                  created_at: agreement.created_at,
                  document: serde_json::to_value(agreement)? })
    }

    pub fn into_agreement(self) -> Result<ServiceAgreement, PersistenceError> {
        Ok(serde_json::from_value(self.document)?)
    }
}

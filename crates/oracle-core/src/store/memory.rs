use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{RunFilter, Store};
use crate::agreement::ServiceAgreement;
use crate::errors::StoreError;
use crate::model::{JobRun, JobSpec, Lease};

/// Store en memoria. Cada entrada de `DashMap` se bloquea individualmente, lo
/// que basta para que claim/cancel/save sean atómicos por run.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    specs: DashMap<String, JobSpec>,
    runs: DashMap<String, JobRun>,
    agreements: DashMap<String, ServiceAgreement>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn save_job_spec(&self, spec: &JobSpec) -> Result<(), StoreError> {
        self.specs.insert(spec.id.clone(), spec.clone());
        Ok(())
    }

    fn job_spec(&self, id: &str) -> Result<JobSpec, StoreError> {
        self.specs
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::not_found("job spec", id))
    }

    fn job_specs(&self) -> Result<Vec<JobSpec>, StoreError> {
        let mut specs: Vec<JobSpec> = self.specs.iter().map(|s| s.value().clone()).collect();
        specs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(specs)
    }

    fn save_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        match self.runs.entry(run.id.clone()) {
            Entry::Occupied(mut o) => {
                if let Some(reason) = o.get().overwrite_conflict(run) {
                    return Err(StoreError::Conflict(reason));
                }
                o.insert(run.clone());
            }
            Entry::Vacant(v) => {
                v.insert(run.clone());
            }
        }
        Ok(())
    }

    fn insert_job_run(&self, run: &JobRun) -> Result<bool, StoreError> {
        match self.runs.entry(run.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(v) => {
                v.insert(run.clone());
                Ok(true)
            }
        }
    }

    fn job_run(&self, id: &str) -> Result<JobRun, StoreError> {
        self.runs
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| StoreError::not_found("job run", id))
    }

    fn job_runs(&self, filter: &RunFilter) -> Result<Vec<JobRun>, StoreError> {
        let mut runs: Vec<JobRun> = self.runs
                                        .iter()
                                        .filter(|r| filter.matches(r.value()))
                                        .map(|r| r.value().clone())
                                        .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(runs)
    }

    fn claim_job_run(&self, id: &str, lease: &Lease) -> Result<Option<JobRun>, StoreError> {
        let mut run = self.runs.get_mut(id).ok_or_else(|| StoreError::not_found("job run", id))?;
        Ok(run.try_claim(lease).then(|| run.clone()))
    }

    fn reclaim_job_run(&self, id: &str, lease: &Lease, now: DateTime<Utc>) -> Result<Option<JobRun>, StoreError> {
        let mut run = self.runs.get_mut(id).ok_or_else(|| StoreError::not_found("job run", id))?;
        Ok(run.try_reclaim(lease, now).then(|| run.clone()))
    }

    fn renew_lease(&self, id: &str, lease: &Lease) -> Result<bool, StoreError> {
        let mut run = self.runs.get_mut(id).ok_or_else(|| StoreError::not_found("job run", id))?;
        Ok(run.try_renew(lease))
    }

    fn cancel_job_run(&self, id: &str) -> Result<bool, StoreError> {
        let mut run = self.runs.get_mut(id).ok_or_else(|| StoreError::not_found("job run", id))?;
        if run.status.is_terminal() {
            return Ok(false);
        }
        run.mark_cancelled(Utc::now());
        Ok(true)
    }

    fn create_service_agreement(&self, agreement: &ServiceAgreement, spec: &JobSpec) -> Result<(), StoreError> {
        match self.agreements.entry(agreement.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("service agreement {} already exists", agreement.id))),
            Entry::Vacant(v) => {
                self.specs.insert(spec.id.clone(), spec.clone());
                v.insert(agreement.clone());
                Ok(())
            }
        }
    }

    fn service_agreement(&self, id: &str) -> Result<ServiceAgreement, StoreError> {
        self.agreements
            .get(id)
            .map(|a| a.clone())
            .ok_or_else(|| StoreError::not_found("service agreement", id))
    }
}

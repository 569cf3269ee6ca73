use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::debug;

use oracle_core::model::{JobRun, JobSpec, Lease};
use oracle_core::{RunFilter, ServiceAgreement, Store, StoreError};

use super::rows::{JobRunRow, JobSpecRow, ServiceAgreementRow};
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{job_runs, job_specs, service_agreements};

/// `Store` sobre Postgres.
pub struct PgStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Carga el run bloqueando la fila hasta el fin de la transacción.
    fn lock_run(conn: &mut PgConnection, id: &str) -> Result<Option<JobRunRow>, PersistenceError> {
        Ok(job_runs::table.find(id)
                          .for_update()
                          .first::<JobRunRow>(conn)
                          .optional()?)
    }

    fn update_run(conn: &mut PgConnection, run: &JobRun) -> Result<(), PersistenceError> {
        let row = JobRunRow::from_run(run)?;
        diesel::update(job_runs::table.find(run.id.as_str())).set(&row).execute(conn)?;
        Ok(())
    }

    /// Aplica `step` al run con la fila bloqueada y lo escribe si `step`
    /// devuelve `true`.
    fn transition_run<F>(&self, id: &str, step: F) -> Result<Option<JobRun>, StoreError>
        where F: Fn(&mut JobRun) -> bool
    {
        let moved = with_retry(|| {
            let mut conn = self.provider.connection()?;
            (*conn).transaction::<_, PersistenceError, _>(|tx| {
                    let Some(row) = Self::lock_run(tx, id)? else {
                        return Err(PersistenceError::NotFound);
                    };
                    let mut run = row.into_run()?;
                    if !step(&mut run) {
                        return Ok(None);
                    }
                    Self::update_run(tx, &run)?;
                    Ok(Some(run))
                })
        });
        match moved {
            Err(PersistenceError::NotFound) => Err(StoreError::not_found("job run", id)),
            other => Ok(other?),
        }
    }
}

impl<P: ConnectionProvider> Store for PgStore<P> {
    fn save_job_spec(&self, spec: &JobSpec) -> Result<(), StoreError> {
        let row = JobSpecRow::from_spec(spec)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(job_specs::table).values(&row)
                                                 .on_conflict(job_specs::id)
                                                 .do_update()
                                                 .set(&row)
                                                 .execute(&mut conn)?;
            Ok(())
        })?;
        Ok(())
    }

    fn job_spec(&self, id: &str) -> Result<JobSpec, StoreError> {
        let row = with_retry(|| {
            let mut conn = self.provider.connection()?;
            Ok(job_specs::table.find(id).first::<JobSpecRow>(&mut conn).optional()?)
        })?;
        let row = row.ok_or_else(|| StoreError::not_found("job spec", id))?;
        Ok(row.into_spec()?)
    }

    fn job_specs(&self) -> Result<Vec<JobSpec>, StoreError> {
        let rows = with_retry(|| {
            let mut conn = self.provider.connection()?;
            Ok(job_specs::table.order((job_specs::created_at.asc(), job_specs::id.asc()))
                               .load::<JobSpecRow>(&mut conn)?)
        })?;
        let specs = rows.into_iter().map(JobSpecRow::into_spec).collect::<Result<Vec<_>, _>>()?;
        Ok(specs)
    }

    fn save_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let row = JobRunRow::from_run(run)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            (*conn).transaction::<_, PersistenceError, _>(|tx| {
                    if let Some(stored) = Self::lock_run(tx, &run.id)? {
                        if let Some(reason) = stored.into_run()?.overwrite_conflict(run) {
                            return Err(PersistenceError::Conflict(reason));
                        }
                    }
                    diesel::insert_into(job_runs::table).values(&row)
                                                        .on_conflict(job_runs::id)
                                                        .do_update()
                                                        .set(&row)
                                                        .execute(tx)?;
                    Ok(())
                })
        })?;
        Ok(())
    }

    fn insert_job_run(&self, run: &JobRun) -> Result<bool, StoreError> {
        let row = JobRunRow::from_run(run)?;
        let inserted = with_retry(|| {
            let mut conn = self.provider.connection()?;
            Ok(diesel::insert_into(job_runs::table).values(&row)
                                                   .on_conflict_do_nothing()
                                                   .execute(&mut conn)?)
        })?;
        Ok(inserted > 0)
    }

    fn job_run(&self, id: &str) -> Result<JobRun, StoreError> {
        let row = with_retry(|| {
            let mut conn = self.provider.connection()?;
            Ok(job_runs::table.find(id).first::<JobRunRow>(&mut conn).optional()?)
        })?;
        let row = row.ok_or_else(|| StoreError::not_found("job run", id))?;
        Ok(row.into_run()?)
    }

    fn job_runs(&self, filter: &RunFilter) -> Result<Vec<JobRun>, StoreError> {
        let rows = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let query: job_runs::BoxedQuery<'_, Pg> = match filter {
                RunFilter::JobSpecId(id) => job_runs::table.filter(job_runs::job_spec_id.eq(id.as_str())).into_boxed(),
                RunFilter::Status(status) => job_runs::table.filter(job_runs::status.eq(status.as_str())).into_boxed(),
                RunFilter::TriggerKey(key) => job_runs::table.filter(job_runs::trigger_key.eq(key.as_str())).into_boxed(),
            };
            Ok(query.order((job_runs::created_at.asc(), job_runs::id.asc()))
                    .load::<JobRunRow>(&mut conn)?)
        })?;
        let runs = rows.into_iter().map(JobRunRow::into_run).collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn claim_job_run(&self, id: &str, lease: &Lease) -> Result<Option<JobRun>, StoreError> {
        let claimed = self.transition_run(id, |run| run.try_claim(lease))?;
        debug!("claim {} by {} -> {}", id, lease.owner, claimed.is_some());
        Ok(claimed)
    }

    fn reclaim_job_run(&self, id: &str, lease: &Lease, now: DateTime<Utc>) -> Result<Option<JobRun>, StoreError> {
        let reclaimed = self.transition_run(id, |run| run.try_reclaim(lease, now))?;
        debug!("reclaim {} by {} -> {}", id, lease.owner, reclaimed.is_some());
        Ok(reclaimed)
    }

    fn renew_lease(&self, id: &str, lease: &Lease) -> Result<bool, StoreError> {
        Ok(self.transition_run(id, |run| run.try_renew(lease))?.is_some())
    }

    fn cancel_job_run(&self, id: &str) -> Result<bool, StoreError> {
        let cancelled = with_retry(|| {
            let mut conn = self.provider.connection()?;
            (*conn).transaction::<_, PersistenceError, _>(|tx| {
                    let Some(row) = Self::lock_run(tx, id)? else {
                        return Err(PersistenceError::NotFound);
                    };
                    let mut run = row.into_run()?;
                    if run.status.is_terminal() {
                        return Ok(false);
                    }
                    run.mark_cancelled(Utc::now());
                    Self::update_run(tx, &run)?;
                    Ok(true)
                })
        });
        match cancelled {
            Err(PersistenceError::NotFound) => Err(StoreError::not_found("job run", id)),
            other => Ok(other?),
        }
    }

    fn create_service_agreement(&self, agreement: &ServiceAgreement, spec: &JobSpec) -> Result<(), StoreError> {
        let spec_row = JobSpecRow::from_spec(spec)?;
        let agreement_row = ServiceAgreementRow::from_agreement(agreement)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            (*conn).transaction::<_, PersistenceError, _>(|tx| {
                    diesel::insert_into(job_specs::table).values(&spec_row)
                                                         .on_conflict(job_specs::id)
                                                         .do_update()
                                                         .set(&spec_row)
                                                         .execute(tx)?;
                    diesel::insert_into(service_agreements::table).values(&agreement_row)
                                                                  .execute(tx)?;
                    Ok(())
                })
        })
        .map_err(|e| match e {
                     PersistenceError::UniqueViolation(_) => {
                         StoreError::Conflict(format!("service agreement {} already exists", agreement.id))
                     }
                     other => other.into(),
                 })
    }

    fn service_agreement(&self, id: &str) -> Result<ServiceAgreement, StoreError> {
        let row = with_retry(|| {
            let mut conn = self.provider.connection()?;
            Ok(service_agreements::table.find(id)
                                        .first::<ServiceAgreementRow>(&mut conn)
                                        .optional()?)
        })?;
        let row = row.ok_or_else(|| StoreError::not_found("service agreement", id))?;
        Ok(row.into_agreement()?)
    }
}

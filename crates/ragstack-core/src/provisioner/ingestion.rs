//! Ingestion driver.

use tracing::info;

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    record::{Disposition, ResourceKind},
    resource::IngestionJob,
};

use crate::poll::{poll_until, PollState};
use crate::retry::retry_transient;

use super::Provisioner;

impl Provisioner {
    /// Start an ingestion job and poll it to a terminal status.
    ///
    /// `COMPLETE` returns the job. `FAILED` and `STOPPED` return
    /// `TerminalJobFailure` with the provider's failure reasons.
    pub fn run_ingestion(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> ProvisionResult<IngestionJob> {
        self.settle("data source readiness", self.config.timing.ingestion_start_delay_secs);

        let service = &self.providers.knowledge;
        let retry = self.config.timing.retry();
        let started = retry_transient("start_ingestion_job", &retry, &*self.sleeper, |_| {
            service.start_ingestion_job(knowledge_base_id, data_source_id)
        })?;
        info!(job_id = %started.id, status = started.status.as_str(), "ingestion job started");
        self.record(ResourceKind::IngestionJob, &started.id, &started.id, Disposition::Created)?;

        let resource = format!("ingestion job '{}'", started.id);
        let policy = self.config.timing.ingestion_poll();
        let job = poll_until(&resource, &policy, &*self.sleeper, || {
            let job = service.get_ingestion_job(knowledge_base_id, data_source_id, &started.id)?;
            if !job.status.is_terminal() {
                Ok(PollState::Pending(job.status.as_str().to_string()))
            } else if job.status.is_success() {
                Ok(PollState::Ready(job))
            } else {
                Err(ProvisionError::TerminalJobFailure {
                    job_id: job.id.clone(),
                    status: job.status.as_str().to_string(),
                    reasons: failure_summary(&job),
                })
            }
        })?;

        info!(
            job_id = %job.id,
            scanned = job.statistics.documents_scanned,
            indexed = job.statistics.documents_indexed,
            failed = job.statistics.documents_failed,
            "ingestion complete"
        );
        Ok(job)
    }
}

fn failure_summary(job: &IngestionJob) -> String {
    if job.failure_reasons.is_empty() {
        "no failure reason reported".to_string()
    } else {
        job.failure_reasons.join("; ")
    }
}

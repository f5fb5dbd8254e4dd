use async_trait::async_trait;
use printforge_core::{
    JobId, JobStatus, JobStore, PrintForgeError, PrintJob, Result, TrackingCode,
};
use uuid::Uuid;

use crate::db::{tracking_index_key, StoreDb, JOBS_CF};

#[async_trait]
impl JobStore for StoreDb {
    async fn insert_job(&self, job: PrintJob) -> Result<()> {
        // Tracking codes are the public handle; refuse the rare collision so
        // the caller can regenerate.
        if self
            .get_index(&tracking_index_key(job.tracking_code.as_str()))?
            .is_some()
        {
            return Err(PrintForgeError::InvalidOperation(format!(
                "tracking code {} already issued",
                job.tracking_code
            )));
        }
        self.put_with_indices(
            JOBS_CF,
            job.id.as_bytes(),
            &job,
            &[(
                tracking_index_key(job.tracking_code.as_str()),
                job.id.as_bytes().to_vec(),
            )],
            &[],
        )
    }

    async fn update_job(&self, job: PrintJob) -> Result<()> {
        if self.get_record::<PrintJob>(JOBS_CF, job.id.as_bytes())?.is_none() {
            return Err(PrintForgeError::NotFound(format!("print job {}", job.id)));
        }
        self.put_record(JOBS_CF, job.id.as_bytes(), &job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<PrintJob>> {
        self.get_record(JOBS_CF, id.as_bytes())
    }

    async fn get_job_by_tracking_code(&self, code: &TrackingCode) -> Result<Option<PrintJob>> {
        match self.get_index(&tracking_index_key(code.as_str()))? {
            Some(id_bytes) => {
                let id = Uuid::from_slice(&id_bytes)
                    .map_err(|_| PrintForgeError::Storage("corrupt tracking index".into()))?;
                self.get_job(id).await
            }
            None => Ok(None),
        }
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<PrintJob>> {
        let mut jobs: Vec<PrintJob> = self
            .scan_records::<PrintJob>(JOBS_CF)?
            .into_iter()
            .filter(|j| j.status == status)
            .collect();
        jobs.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(jobs)
    }

    async fn list_jobs(&self) -> Result<Vec<PrintJob>> {
        let mut jobs: Vec<PrintJob> = self.scan_records(JOBS_CF)?;
        jobs.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(jobs)
    }
}

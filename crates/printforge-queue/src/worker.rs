use async_trait::async_trait;
use metrics::{counter, histogram};
use printforge_core::{JobStatus, JobStore, PrintJob};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::queue::{transition, PrinterPool};

/// Seam to the physical device. The production driver talks to printer
/// firmware; tests and the default deployment use the simulator.
#[async_trait]
pub trait PrintDriver: Send + Sync {
    async fn print(&self, job: &PrintJob) -> Result<(), String>;
}

pub struct SimulatedDriver {
    pub duration: Duration,
}

impl SimulatedDriver {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl PrintDriver for SimulatedDriver {
    async fn print(&self, _job: &PrintJob) -> Result<(), String> {
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// Consumes assigned jobs and runs them to a terminal status. Several
/// workers share one receiver; each locks it only long enough to take the
/// next job.
pub struct JobWorker {
    receiver: Arc<Mutex<Receiver<PrintJob>>>,
    store: Arc<dyn JobStore>,
    printers: Arc<PrinterPool>,
    driver: Arc<dyn PrintDriver>,
}

impl JobWorker {
    pub fn new(
        receiver: Arc<Mutex<Receiver<PrintJob>>>,
        store: Arc<dyn JobStore>,
        printers: Arc<PrinterPool>,
        driver: Arc<dyn PrintDriver>,
    ) -> Self {
        Self {
            receiver,
            store,
            printers,
            driver,
        }
    }

    pub async fn run(self) {
        loop {
            let job = {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            };
            let Some(job) = job else {
                info!("job channel closed, worker exiting");
                return;
            };
            self.process(job).await;
        }
    }

    async fn process(&self, mut job: PrintJob) {
        let printer_id = job.printer_id.clone();

        if let Err(e) = transition(&mut job, JobStatus::Printing) {
            // A cancel can land between assignment and pickup.
            warn!(job_id = %job.id, "job no longer printable: {}", e);
            if let Some(printer_id) = printer_id.as_deref() {
                self.printers.release(printer_id);
            }
            return;
        }
        if let Err(e) = self.store.update_job(job.clone()).await {
            error!(job_id = %job.id, "failed to persist printing status: {}", e);
            if let Some(printer_id) = printer_id.as_deref() {
                self.printers.release(printer_id);
            }
            return;
        }
        info!(job_id = %job.id, printer = ?printer_id, "printing started");

        let start = Instant::now();
        let outcome = self.driver.print(&job).await;
        histogram!("print_duration_seconds").record(start.elapsed().as_secs_f64());

        let result = match outcome {
            Ok(()) => {
                counter!("jobs_completed").increment(1);
                transition(&mut job, JobStatus::Completed)
            }
            Err(reason) => {
                counter!("jobs_failed").increment(1);
                job.failure_reason = Some(reason);
                transition(&mut job, JobStatus::Failed)
            }
        };
        if let Err(e) = result {
            error!(job_id = %job.id, "terminal transition rejected: {}", e);
        } else if let Err(e) = self.store.update_job(job.clone()).await {
            error!(job_id = %job.id, "failed to persist terminal status: {}", e);
        } else {
            info!(job_id = %job.id, status = ?job.status, "job finished");
        }

        if let Some(printer_id) = printer_id.as_deref() {
            self.printers.release(printer_id);
        }
    }
}

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge};
use printforge_core::{
    generate_tracking_code, JobId, JobPriority, JobStatus, JobStore, PrintJob, TrackingCode,
};
use priority_queue::PriorityQueue;
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Print job not found: {0}")]
    JobNotFound(JobId),
    #[error("Illegal status transition: {from:?} -> {to:?}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
    #[error("Job {0} is being assigned and can no longer be cancelled from the queue")]
    AssignmentInFlight(JobId),
    #[error("Job {0} is not pending")]
    NotPending(JobId),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Channel send error: {0}")]
    ChannelSend(String),
    #[error("Could not issue a unique tracking code")]
    TrackingCodeExhausted,
}

impl From<printforge_core::PrintForgeError> for QueueError {
    fn from(err: printforge_core::PrintForgeError) -> Self {
        QueueError::Storage(err.to_string())
    }
}

/// Ordering key: priority beats submission order; among equal priorities the
/// earliest submission wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EffectivePriority {
    priority: JobPriority,
    order: Reverse<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Printer {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
struct PrinterSlot {
    printer: Printer,
    busy: bool,
}

/// Registered printers and their busy flags.
pub struct PrinterPool {
    slots: DashMap<String, PrinterSlot>,
}

impl PrinterPool {
    pub fn new(printers: Vec<Printer>) -> Self {
        let slots = DashMap::new();
        for printer in printers {
            slots.insert(
                printer.id.clone(),
                PrinterSlot {
                    printer,
                    busy: false,
                },
            );
        }
        Self { slots }
    }

    /// Claim an idle printer, marking it busy.
    pub fn acquire_idle(&self) -> Option<Printer> {
        for mut slot in self.slots.iter_mut() {
            if !slot.busy {
                slot.busy = true;
                return Some(slot.printer.clone());
            }
        }
        None
    }

    pub fn release(&self, printer_id: &str) {
        if let Some(mut slot) = self.slots.get_mut(printer_id) {
            slot.busy = false;
        } else {
            warn!(printer_id, "release for unknown printer");
        }
    }

    pub fn idle_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.busy).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Public tracking payload: status and progress only, never customer or
/// order contents.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingStatus {
    pub tracking_code: TrackingCode,
    pub status: JobStatus,
    pub status_label: &'static str,
    pub queue_position: Option<usize>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    pub pending: usize,
    pub printers_total: usize,
    pub printers_idle: usize,
}

/// The print-job queue. Jobs are persisted through the `JobStore` before
/// they are eligible for dispatch, so a restart replays pending work from
/// storage.
pub struct PrintQueue {
    pq: Arc<RwLock<PriorityQueue<JobId, EffectivePriority>>>,
    seq: AtomicU64,
    store: Arc<dyn JobStore>,
    printers: Arc<PrinterPool>,
    sender: Sender<PrintJob>,
    dispatch_idle: Duration,
}

impl PrintQueue {
    pub fn new(
        store: Arc<dyn JobStore>,
        printers: Arc<PrinterPool>,
        channel_capacity: usize,
        dispatch_idle: Duration,
    ) -> (Self, Receiver<PrintJob>) {
        let (sender, receiver) = mpsc::channel(channel_capacity);
        (
            Self {
                pq: Arc::new(RwLock::new(PriorityQueue::new())),
                seq: AtomicU64::new(0),
                store,
                printers,
                sender,
                dispatch_idle,
            },
            receiver,
        )
    }

    /// Re-enqueue pending jobs found in storage, oldest first. Called once on
    /// startup.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let pending = self.store.list_jobs_by_status(JobStatus::Pending).await?;
        let count = pending.len();
        let mut pq = self.pq.write().await;
        for job in pending {
            let order = Reverse(self.seq.fetch_add(1, Ordering::Relaxed));
            pq.push(
                job.id,
                EffectivePriority {
                    priority: job.priority,
                    order,
                },
            );
        }
        gauge!("queue_depth").set(pq.len() as f64);
        if count > 0 {
            info!(count, "recovered pending print jobs");
        }
        Ok(count)
    }

    /// Persist and enqueue a job. On a tracking-code collision the code is
    /// regenerated and the insert retried.
    pub async fn submit(&self, mut job: PrintJob) -> Result<PrintJob, QueueError> {
        let mut attempts = 0;
        loop {
            match self.store.insert_job(job.clone()).await {
                Ok(()) => break,
                Err(printforge_core::PrintForgeError::InvalidOperation(_)) if attempts < 4 => {
                    attempts += 1;
                    job.tracking_code = generate_tracking_code();
                }
                Err(printforge_core::PrintForgeError::InvalidOperation(_)) => {
                    return Err(QueueError::TrackingCodeExhausted);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let order = Reverse(self.seq.fetch_add(1, Ordering::Relaxed));
        let mut pq = self.pq.write().await;
        pq.push(
            job.id,
            EffectivePriority {
                priority: job.priority,
                order,
            },
        );
        counter!("jobs_submitted").increment(1);
        gauge!("queue_depth").set(pq.len() as f64);
        info!(job_id = %job.id, tracking = %job.tracking_code, priority = ?job.priority, "job submitted");
        Ok(job)
    }

    pub async fn queue_depth(&self) -> usize {
        self.pq.read().await.len()
    }

    pub async fn summary(&self) -> QueueSummary {
        QueueSummary {
            pending: self.queue_depth().await,
            printers_total: self.printers.len(),
            printers_idle: self.printers.idle_count(),
        }
    }

    /// 1-based position among pending jobs; `None` when the job is no longer
    /// waiting.
    pub async fn position(&self, job_id: JobId) -> Option<usize> {
        let pq = self.pq.read().await;
        let own = *pq.get_priority(&job_id)?;
        let ahead = pq
            .iter()
            .filter(|(_, priority)| **priority > own)
            .count();
        Some(ahead + 1)
    }

    pub async fn cancel(&self, job_id: JobId) -> Result<PrintJob, QueueError> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(QueueError::JobNotFound(job_id))?;

        match job.status {
            JobStatus::Pending => {
                let removed = {
                    let mut pq = self.pq.write().await;
                    let removed = pq.remove(&job_id).is_some();
                    gauge!("queue_depth").set(pq.len() as f64);
                    removed
                };
                // Still pending in storage but gone from the queue means the
                // dispatcher picked it up between our reads.
                if !removed {
                    return Err(QueueError::AssignmentInFlight(job_id));
                }
                transition(&mut job, JobStatus::Cancelled)?;
                self.store.update_job(job.clone()).await?;
            }
            JobStatus::Assigned => {
                transition(&mut job, JobStatus::Cancelled)?;
                self.store.update_job(job.clone()).await?;
                if let Some(printer_id) = job.printer_id.as_deref() {
                    self.printers.release(printer_id);
                }
            }
            from => {
                return Err(QueueError::IllegalTransition {
                    from,
                    to: JobStatus::Cancelled,
                })
            }
        }
        counter!("jobs_cancelled").increment(1);
        info!(job_id = %job.id, "job cancelled");
        Ok(job)
    }

    /// Change the priority of a job that is still waiting in the queue.
    pub async fn reprioritize(
        &self,
        job_id: JobId,
        priority: JobPriority,
    ) -> Result<PrintJob, QueueError> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(QueueError::JobNotFound(job_id))?;
        if job.status != JobStatus::Pending {
            return Err(QueueError::NotPending(job_id));
        }

        {
            let mut pq = self.pq.write().await;
            let current = pq
                .get_priority(&job_id)
                .copied()
                .ok_or(QueueError::AssignmentInFlight(job_id))?;
            pq.change_priority(
                &job_id,
                EffectivePriority {
                    priority,
                    order: current.order,
                },
            );
        }

        job.priority = priority;
        self.store.update_job(job.clone()).await?;
        info!(job_id = %job_id, priority = ?priority, "job reprioritized");
        Ok(job)
    }

    /// Unauthenticated status lookup by tracking code.
    pub async fn track(&self, code: &TrackingCode) -> Result<Option<TrackingStatus>, QueueError> {
        let Some(job) = self.store.get_job_by_tracking_code(code).await? else {
            return Ok(None);
        };
        let queue_position = if job.status == JobStatus::Pending {
            self.position(job.id).await
        } else {
            None
        };
        Ok(Some(TrackingStatus {
            tracking_code: job.tracking_code,
            status: job.status,
            status_label: job.status.display_label(),
            queue_position,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }))
    }

    /// Hand the highest-priority pending job to an idle printer, forever.
    pub async fn dispatch_loop(&self) {
        loop {
            let Some(printer) = self.printers.acquire_idle() else {
                tokio::time::sleep(self.dispatch_idle).await;
                continue;
            };

            let popped = {
                let mut pq = self.pq.write().await;
                let popped = pq.pop();
                gauge!("queue_depth").set(pq.len() as f64);
                popped
            };

            let Some((job_id, _)) = popped else {
                self.printers.release(&printer.id);
                tokio::time::sleep(self.dispatch_idle).await;
                continue;
            };

            match self.assign(job_id, &printer).await {
                Ok(job) => {
                    if let Err(e) = self.sender.send(job).await {
                        warn!(job_id = %job_id, "worker channel closed: {}", e);
                        self.printers.release(&printer.id);
                        return;
                    }
                }
                Err(e) => {
                    warn!(job_id = %job_id, "skipping undispatchable job: {}", e);
                    self.printers.release(&printer.id);
                }
            }
        }
    }

    async fn assign(&self, job_id: JobId, printer: &Printer) -> Result<PrintJob, QueueError> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(QueueError::JobNotFound(job_id))?;
        transition(&mut job, JobStatus::Assigned)?;
        job.printer_id = Some(printer.id.clone());
        self.store.update_job(job.clone()).await?;
        counter!("jobs_assigned").increment(1);
        info!(job_id = %job.id, printer = %printer.id, "job assigned");
        Ok(job)
    }
}

/// Guarded status change: refused transitions leave the job untouched.
pub(crate) fn transition(job: &mut PrintJob, next: JobStatus) -> Result<(), QueueError> {
    if !job.status.can_transition_to(next) {
        return Err(QueueError::IllegalTransition {
            from: job.status,
            to: next,
        });
    }
    job.status = next;
    match next {
        JobStatus::Printing => job.started_at = Some(Utc::now()),
        JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed => {
            job.completed_at = Some(Utc::now())
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_priority_orders_by_priority_then_fifo() {
        let early_normal = EffectivePriority {
            priority: JobPriority::Normal,
            order: Reverse(1),
        };
        let late_normal = EffectivePriority {
            priority: JobPriority::Normal,
            order: Reverse(2),
        };
        let late_rush = EffectivePriority {
            priority: JobPriority::Rush,
            order: Reverse(3),
        };
        assert!(late_rush > early_normal);
        assert!(early_normal > late_normal);
    }

    #[test]
    fn transition_sets_timestamps() {
        let mut job = PrintJob::new(
            uuid::Uuid::new_v4(),
            generate_tracking_code(),
            "PLA",
            JobPriority::Normal,
        );
        transition(&mut job, JobStatus::Assigned).unwrap();
        transition(&mut job, JobStatus::Printing).unwrap();
        assert!(job.started_at.is_some());
        transition(&mut job, JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());

        let err = transition(&mut job, JobStatus::Printing).unwrap_err();
        assert!(matches!(err, QueueError::IllegalTransition { .. }));
        assert_eq!(job.status, JobStatus::Completed);
    }
}

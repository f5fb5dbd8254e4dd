use async_trait::async_trait;
use printforge_core::{
    generate_tracking_code, JobPriority, JobStatus, JobStore, PrintJob,
};
use printforge_queue::{
    JobWorker, PrintDriver, PrintQueue, Printer, PrinterPool, QueueError, SimulatedDriver,
};
use printforge_store::StoreDb;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use uuid::Uuid;

struct FailingDriver;

#[async_trait]
impl PrintDriver for FailingDriver {
    async fn print(&self, _job: &PrintJob) -> Result<(), String> {
        Err("nozzle clog detected".into())
    }
}

fn test_printers() -> Arc<PrinterPool> {
    Arc::new(PrinterPool::new(vec![Printer {
        id: "prusa-1".into(),
        name: "Prusa MK4".into(),
    }]))
}

fn new_job(priority: JobPriority) -> PrintJob {
    PrintJob::new(Uuid::new_v4(), generate_tracking_code(), "PLA", priority)
}

async fn setup(
    printers: Arc<PrinterPool>,
) -> (Arc<StoreDb>, PrintQueue, tokio::sync::mpsc::Receiver<PrintJob>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(StoreDb::open_at(dir.path()).unwrap());
    let (queue, receiver) = PrintQueue::new(
        store.clone(),
        printers,
        16,
        Duration::from_millis(10),
    );
    (store, queue, receiver, dir)
}

#[tokio::test]
async fn priority_determines_queue_position() {
    let (_store, queue, _receiver, _dir) = setup(test_printers()).await;

    let normal = queue.submit(new_job(JobPriority::Normal)).await.unwrap();
    let rush = queue.submit(new_job(JobPriority::Rush)).await.unwrap();
    let low = queue.submit(new_job(JobPriority::Low)).await.unwrap();

    assert_eq!(queue.position(rush.id).await, Some(1));
    assert_eq!(queue.position(normal.id).await, Some(2));
    assert_eq!(queue.position(low.id).await, Some(3));
    assert_eq!(queue.queue_depth().await, 3);
}

#[tokio::test]
async fn tracking_reports_position_and_labels() {
    let (_store, queue, _receiver, _dir) = setup(test_printers()).await;

    let first = queue.submit(new_job(JobPriority::Normal)).await.unwrap();
    let second = queue.submit(new_job(JobPriority::Normal)).await.unwrap();

    let status = queue.track(&second.tracking_code).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Pending);
    assert_eq!(status.status_label, "In queue");
    assert_eq!(status.queue_position, Some(2));

    let status = queue.track(&first.tracking_code).await.unwrap().unwrap();
    assert_eq!(status.queue_position, Some(1));

    let missing = printforge_core::TrackingCode::parse("ZZZZZZZZZZ").unwrap();
    assert!(queue.track(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn dispatch_and_worker_complete_a_job() {
    let printers = test_printers();
    let (store, queue, receiver, _dir) = setup(printers.clone()).await;
    let queue = Arc::new(queue);

    let job = queue.submit(new_job(JobPriority::Normal)).await.unwrap();

    let dispatcher = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dispatch_loop().await })
    };
    let worker = JobWorker::new(
        Arc::new(Mutex::new(receiver)),
        store.clone(),
        printers.clone(),
        Arc::new(SimulatedDriver::new(Duration::from_millis(20))),
    );
    let worker_handle = tokio::spawn(worker.run());

    let mut finished = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let current = store.get_job(job.id).await.unwrap().unwrap();
        if current.status.is_terminal() {
            finished = Some(current);
            break;
        }
    }
    let finished = finished.expect("job did not finish in time");
    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.started_at.is_some());
    assert!(finished.completed_at.is_some());
    assert_eq!(finished.printer_id.as_deref(), Some("prusa-1"));
    assert_eq!(printers.idle_count(), 1);

    dispatcher.abort();
    worker_handle.abort();
}

#[tokio::test]
async fn failed_prints_record_the_reason() {
    let printers = test_printers();
    let (store, queue, receiver, _dir) = setup(printers.clone()).await;
    let queue = Arc::new(queue);

    let job = queue.submit(new_job(JobPriority::High)).await.unwrap();

    let dispatcher = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dispatch_loop().await })
    };
    let worker = JobWorker::new(
        Arc::new(Mutex::new(receiver)),
        store.clone(),
        printers.clone(),
        Arc::new(FailingDriver),
    );
    let worker_handle = tokio::spawn(worker.run());

    let mut finished = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let current = store.get_job(job.id).await.unwrap().unwrap();
        if current.status.is_terminal() {
            finished = Some(current);
            break;
        }
    }
    let finished = finished.expect("job did not finish in time");
    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(
        finished.failure_reason.as_deref(),
        Some("nozzle clog detected")
    );
    assert_eq!(printers.idle_count(), 1);

    dispatcher.abort();
    worker_handle.abort();
}

#[tokio::test]
async fn cancel_only_from_cancellable_states() {
    let (store, queue, _receiver, _dir) = setup(test_printers()).await;

    let job = queue.submit(new_job(JobPriority::Normal)).await.unwrap();
    let cancelled = queue.cancel(job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert_eq!(queue.queue_depth().await, 0);

    // Already terminal: refused
    let err = queue.cancel(job.id).await.unwrap_err();
    assert!(matches!(err, QueueError::IllegalTransition { .. }));

    // Unknown job
    let err = queue.cancel(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, QueueError::JobNotFound(_)));

    // The store reflects the cancellation
    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn reprioritize_moves_a_pending_job_forward() {
    let (_store, queue, _receiver, _dir) = setup(test_printers()).await;

    let first = queue.submit(new_job(JobPriority::Normal)).await.unwrap();
    let second = queue.submit(new_job(JobPriority::Normal)).await.unwrap();
    assert_eq!(queue.position(second.id).await, Some(2));

    queue
        .reprioritize(second.id, JobPriority::Rush)
        .await
        .unwrap();
    assert_eq!(queue.position(second.id).await, Some(1));
    assert_eq!(queue.position(first.id).await, Some(2));

    let err = queue
        .reprioritize(Uuid::new_v4(), JobPriority::Rush)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::JobNotFound(_)));
}

#[tokio::test]
async fn recover_requeues_pending_jobs_from_storage() {
    let printers = test_printers();
    let dir = TempDir::new().unwrap();
    let store = Arc::new(StoreDb::open_at(dir.path()).unwrap());

    // Jobs persisted by a previous process
    for _ in 0..3 {
        store.insert_job(new_job(JobPriority::Normal)).await.unwrap();
    }

    let (queue, _receiver) = PrintQueue::new(
        store.clone(),
        printers,
        16,
        Duration::from_millis(10),
    );
    assert_eq!(queue.queue_depth().await, 0);
    let recovered = queue.recover().await.unwrap();
    assert_eq!(recovered, 3);
    assert_eq!(queue.queue_depth().await, 3);
}

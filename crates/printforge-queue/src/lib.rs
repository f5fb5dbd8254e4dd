pub mod queue;
pub mod worker;

pub use queue::{PrintQueue, Printer, PrinterPool, QueueError, QueueSummary, TrackingStatus};
pub use worker::{JobWorker, PrintDriver, SimulatedDriver};

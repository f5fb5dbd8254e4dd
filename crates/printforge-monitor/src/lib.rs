pub mod alerts;
pub mod metrics;

pub use alerts::{AlertEngine, AlertSeverity, PerfAlert, Threshold, ThresholdKind};
pub use metrics::{register_metrics, render_metrics, REGISTRY};

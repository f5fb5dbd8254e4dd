use printforge_core::{CsrfProtect, JwtManager, PrintForgeConfig, PrintJob, Result};
use printforge_monitor::AlertEngine;
use printforge_queue::{PrintQueue, Printer, PrinterPool};
use printforge_quote::{MaterialTable, Quoter};
use printforge_store::StoreDb;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

use crate::auth::RateLimitManager;

#[derive(Clone)]
pub struct AppState {
    pub config: PrintForgeConfig,
    pub store: Arc<StoreDb>,
    pub queue: Arc<PrintQueue>,
    pub printers: Arc<PrinterPool>,
    pub quoter: Arc<Quoter>,
    pub alerts: Arc<AlertEngine>,
    pub jwt: Arc<JwtManager>,
    pub csrf: Arc<CsrfProtect>,
    pub rate_limits: Arc<RateLimitManager>,
}

impl AppState {
    /// Wire every subsystem from configuration. The returned receiver is
    /// the worker side of the dispatch channel; the server spawns workers
    /// over it.
    pub fn new(config: PrintForgeConfig) -> Result<(Self, Receiver<PrintJob>)> {
        printforge_monitor::register_metrics();

        let store = Arc::new(StoreDb::open(&config.storage)?);

        let printers = Arc::new(PrinterPool::new(
            (1..=config.queue.worker_count)
                .map(|n| Printer {
                    id: format!("printer-{}", n),
                    name: format!("Printer {}", n),
                })
                .collect(),
        ));
        let (queue, receiver) = PrintQueue::new(
            store.clone(),
            printers.clone(),
            config.queue.channel_capacity,
            Duration::from_millis(config.queue.dispatch_idle_ms),
        );

        let quoter = Arc::new(Quoter::new(config.cache.clone(), MaterialTable::default()));
        let alerts = Arc::new(AlertEngine::from_config(&config.monitoring));
        let jwt = Arc::new(JwtManager::new(&config.auth));
        let csrf = Arc::new(CsrfProtect::new(config.auth.jwt_secret.as_bytes().to_vec()));

        Ok((
            Self {
                config,
                store,
                queue: Arc::new(queue),
                printers,
                quoter,
                alerts,
                jwt,
                csrf,
                rate_limits: Arc::new(RateLimitManager::new()),
            },
            receiver,
        ))
    }
}

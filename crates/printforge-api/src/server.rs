use crate::{create_router, AppState};
use printforge_core::{PrintForgeConfig, PrintForgeError, Result};
use printforge_monitor::{metrics, ThresholdKind};
use printforge_queue::{JobWorker, SimulatedDriver};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::info;

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub async fn new(config: PrintForgeConfig) -> Result<Self> {
        let host: IpAddr = config
            .server
            .host
            .parse()
            .map_err(|_| PrintForgeError::Config(format!("bad listen host {}", config.server.host)))?;
        let addr = SocketAddr::new(host, config.server.port);

        let (state, receiver) = AppState::new(config)?;

        let recovered = state
            .queue
            .recover()
            .await
            .map_err(|e| PrintForgeError::Queue(e.to_string()))?;
        if recovered > 0 {
            info!(recovered, "requeued jobs left over from the previous run");
        }

        // Dispatcher and print workers
        {
            let queue = state.queue.clone();
            tokio::spawn(async move { queue.dispatch_loop().await });
        }
        let shared_receiver = Arc::new(Mutex::new(receiver));
        let driver = Arc::new(SimulatedDriver::new(Duration::from_secs(
            state.config.queue.simulated_print_secs,
        )));
        for _ in 0..state.config.queue.worker_count {
            let worker = JobWorker::new(
                shared_receiver.clone(),
                state.store.clone(),
                state.printers.clone(),
                driver.clone(),
            );
            tokio::spawn(worker.run());
        }

        // Housekeeping: the cron scripts of the original deployment, as a
        // supervised loop.
        {
            let state = state.clone();
            tokio::spawn(async move {
                let retention =
                    Duration::from_secs(state.config.monitoring.alert_retention_secs);
                loop {
                    tokio::time::sleep(Duration::from_secs(30)).await;

                    let pruned = state.alerts.prune(retention);
                    if pruned > 0 {
                        info!(pruned, "pruned aged-out alerts");
                    }

                    let swept = state.quoter.sweep_cache();
                    if swept > 0 {
                        info!(swept, "swept expired quotes from the cache");
                    }

                    let depth = state.queue.queue_depth().await;
                    metrics::QUEUE_DEPTH.set(depth as f64);
                    state.alerts.observe(ThresholdKind::QueueDepth, depth as f64);

                    let cache = state.quoter.cache_stats();
                    metrics::QUOTE_CACHE_HITS.set(cache.hits as f64);
                    metrics::QUOTE_CACHE_MISSES.set(cache.misses as f64);
                    if cache.hits + cache.misses > 0 {
                        state
                            .alerts
                            .observe(ThresholdKind::CacheMissRate, cache.miss_rate());
                    }
                }
            });
        }

        Ok(Self { state, addr })
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting PrintForge API server on {}", self.addr);

        // Bind with tuned socket options for better keep-alive behavior
        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }
            .map_err(PrintForgeError::Io)?;

            // Reuse addr/port to improve rebind under restarts
            let _ = socket.set_reuseaddr(true);
            #[cfg(unix)]
            let _ = socket.set_reuseport(true);
            let _ = socket.set_keepalive(true);

            socket.bind(self.addr).map_err(PrintForgeError::Io)?;
            socket.listen(1024)?
        };

        info!("Server listening on http://{}", self.addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(PrintForgeError::Io)
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown signal received, draining connections");
}

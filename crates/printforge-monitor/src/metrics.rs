use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS_TOTAL: Counter =
        Counter::with_opts(Opts::new("http_requests_total", "Total number of HTTP requests"))
            .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: Histogram =
        Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))
        .unwrap();

    pub static ref QUEUE_DEPTH: Gauge =
        Gauge::with_opts(Opts::new("print_queue_depth", "Pending jobs in the print queue"))
            .unwrap();

    // Published from cache statistics by the housekeeping task, hence
    // gauges rather than counters.
    pub static ref QUOTE_CACHE_HITS: Gauge =
        Gauge::with_opts(Opts::new("quote_cache_hits", "Quotation cache hits"))
            .unwrap();

    pub static ref QUOTE_CACHE_MISSES: Gauge =
        Gauge::with_opts(Opts::new("quote_cache_misses", "Quotation cache misses"))
            .unwrap();

    pub static ref ORDERS_PLACED_TOTAL: Counter =
        Counter::with_opts(Opts::new("orders_placed_total", "Orders placed at checkout"))
            .unwrap();

    pub static ref ALERTS_RAISED_TOTAL: Counter =
        Counter::with_opts(Opts::new("alerts_raised_total", "Performance alerts raised"))
            .unwrap();
}

pub fn register_metrics() {
    // register() fails on double registration; subsequent calls are no-ops.
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_DEPTH.clone()));
    let _ = REGISTRY.register(Box::new(QUOTE_CACHE_HITS.clone()));
    let _ = REGISTRY.register(Box::new(QUOTE_CACHE_MISSES.clone()));
    let _ = REGISTRY.register(Box::new(ORDERS_PLACED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ALERTS_RAISED_TOTAL.clone()));
}

/// Text exposition of every registered metric, for the /metrics endpoint.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_after_registration() {
        register_metrics();
        register_metrics(); // idempotent
        HTTP_REQUESTS_TOTAL.inc();
        QUEUE_DEPTH.set(4.0);
        let rendered = render_metrics();
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("print_queue_depth"));
    }
}

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use printforge_core::MonitoringConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Measurements the engine knows how to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    RequestLatencyMs,
    QueueDepth,
    CacheMissRate,
    StorageErrors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
    pub kind: ThresholdKind,
    /// Measured values above this raise an alert.
    pub limit: f64,
    pub severity: AlertSeverity,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfAlert {
    pub id: Uuid,
    pub kind: ThresholdKind,
    pub severity: AlertSeverity,
    pub measured: f64,
    pub limit: f64,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

struct EngineState {
    history: VecDeque<PerfAlert>,
    last_raised: HashMap<ThresholdKind, Instant>,
}

/// Threshold-based alerting with a cooldown per threshold and a bounded
/// in-memory history. The server prunes the history on a retention
/// schedule and exports it for the admin dashboard.
pub struct AlertEngine {
    thresholds: HashMap<ThresholdKind, Threshold>,
    state: Mutex<EngineState>,
    history_capacity: usize,
}

impl AlertEngine {
    pub fn new(thresholds: Vec<Threshold>, history_capacity: usize) -> Self {
        Self {
            thresholds: thresholds.into_iter().map(|t| (t.kind, t)).collect(),
            state: Mutex::new(EngineState {
                history: VecDeque::new(),
                last_raised: HashMap::new(),
            }),
            history_capacity,
        }
    }

    pub fn from_config(config: &MonitoringConfig) -> Self {
        let cooldown = config.alert_cooldown_secs;
        Self::new(
            vec![
                Threshold {
                    kind: ThresholdKind::RequestLatencyMs,
                    limit: config.request_latency_ms,
                    severity: AlertSeverity::Warning,
                    cooldown_secs: cooldown,
                },
                Threshold {
                    kind: ThresholdKind::QueueDepth,
                    limit: config.queue_depth,
                    severity: AlertSeverity::Warning,
                    cooldown_secs: cooldown,
                },
                Threshold {
                    kind: ThresholdKind::CacheMissRate,
                    limit: config.cache_miss_rate,
                    severity: AlertSeverity::Info,
                    cooldown_secs: cooldown,
                },
                Threshold {
                    kind: ThresholdKind::StorageErrors,
                    limit: 0.0,
                    severity: AlertSeverity::Critical,
                    cooldown_secs: cooldown,
                },
            ],
            config.history_capacity,
        )
    }

    /// Compare a measurement against its threshold; at most one alert per
    /// threshold per cooldown window.
    pub fn observe(&self, kind: ThresholdKind, measured: f64) -> Option<PerfAlert> {
        let threshold = self.thresholds.get(&kind)?;
        if measured <= threshold.limit {
            return None;
        }

        let mut state = self.state.lock();
        let cooldown = Duration::from_secs(threshold.cooldown_secs);
        if let Some(last) = state.last_raised.get(&kind) {
            if last.elapsed() < cooldown {
                return None;
            }
        }
        state.last_raised.insert(kind, Instant::now());

        let alert = PerfAlert {
            id: Uuid::new_v4(),
            kind,
            severity: threshold.severity,
            measured,
            limit: threshold.limit,
            message: format!(
                "{:?} at {:.2} exceeded limit {:.2}",
                kind, measured, threshold.limit
            ),
            raised_at: Utc::now(),
        };

        if state.history.len() >= self.history_capacity {
            state.history.pop_front();
        }
        state.history.push_back(alert.clone());
        crate::metrics::ALERTS_RAISED_TOTAL.inc();
        warn!(
            kind = ?kind,
            measured,
            limit = threshold.limit,
            severity = ?threshold.severity,
            "performance alert raised"
        );
        Some(alert)
    }

    /// Newest-first history, optionally filtered.
    pub fn history(
        &self,
        severity: Option<AlertSeverity>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<PerfAlert> {
        let state = self.state.lock();
        state
            .history
            .iter()
            .rev()
            .filter(|alert| severity.map_or(true, |s| alert.severity == s))
            .filter(|alert| since.map_or(true, |ts| alert.raised_at >= ts))
            .cloned()
            .collect()
    }

    /// Alerts still inside their threshold's cooldown window, newest first.
    pub fn active(&self) -> Vec<PerfAlert> {
        let state = self.state.lock();
        state
            .history
            .iter()
            .rev()
            .filter(|alert| {
                let cooldown = self
                    .thresholds
                    .get(&alert.kind)
                    .map(|t| t.cooldown_secs)
                    .unwrap_or(0);
                let age = Utc::now() - alert.raised_at;
                age <= chrono::Duration::seconds(cooldown as i64)
            })
            .cloned()
            .collect()
    }

    /// Drop entries older than the retention window; returns the number
    /// removed.
    pub fn prune(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
        let mut state = self.state.lock();
        let before = state.history.len();
        state.history.retain(|alert| alert.raised_at >= cutoff);
        before - state.history.len()
    }

    pub fn alert_count(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Full history as a JSON document for the dashboard export.
    pub fn export_json(&self) -> serde_json::Value {
        let history = self.history(None, None);
        serde_json::json!({
            "exported_at": Utc::now(),
            "alert_count": history.len(),
            "alerts": history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(cooldown_secs: u64) -> AlertEngine {
        AlertEngine::new(
            vec![
                Threshold {
                    kind: ThresholdKind::QueueDepth,
                    limit: 10.0,
                    severity: AlertSeverity::Warning,
                    cooldown_secs,
                },
                Threshold {
                    kind: ThresholdKind::StorageErrors,
                    limit: 0.0,
                    severity: AlertSeverity::Critical,
                    cooldown_secs,
                },
            ],
            100,
        )
    }

    #[test]
    fn values_within_limit_raise_nothing() {
        let engine = engine(0);
        assert!(engine.observe(ThresholdKind::QueueDepth, 10.0).is_none());
        assert!(engine.observe(ThresholdKind::QueueDepth, 3.0).is_none());
        assert_eq!(engine.alert_count(), 0);
    }

    #[test]
    fn breaches_raise_with_severity_and_message() {
        let engine = engine(0);
        let alert = engine.observe(ThresholdKind::QueueDepth, 25.0).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.measured, 25.0);
        assert!(alert.message.contains("25.00"));

        let alert = engine.observe(ThresholdKind::StorageErrors, 1.0).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let engine = engine(3600);
        assert!(engine.observe(ThresholdKind::QueueDepth, 25.0).is_some());
        assert!(engine.observe(ThresholdKind::QueueDepth, 30.0).is_none());
        // A different threshold is unaffected
        assert!(engine.observe(ThresholdKind::StorageErrors, 1.0).is_some());
        assert_eq!(engine.alert_count(), 2);
    }

    #[test]
    fn history_filters_and_orders_newest_first() {
        let engine = engine(0);
        engine.observe(ThresholdKind::QueueDepth, 20.0);
        engine.observe(ThresholdKind::StorageErrors, 2.0);

        let all = engine.history(None, None);
        assert_eq!(all.len(), 2);
        assert!(all[0].raised_at >= all[1].raised_at);

        let critical = engine.history(Some(AlertSeverity::Critical), None);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].kind, ThresholdKind::StorageErrors);
    }

    #[test]
    fn history_is_bounded() {
        let engine = AlertEngine::new(
            vec![Threshold {
                kind: ThresholdKind::QueueDepth,
                limit: 0.0,
                severity: AlertSeverity::Info,
                cooldown_secs: 0,
            }],
            3,
        );
        for i in 0..10 {
            engine.observe(ThresholdKind::QueueDepth, 1.0 + i as f64);
        }
        assert_eq!(engine.alert_count(), 3);
    }

    #[test]
    fn active_respects_the_cooldown_window() {
        let hot = engine(3600);
        hot.observe(ThresholdKind::QueueDepth, 20.0);
        assert_eq!(hot.active().len(), 1);

        let cold = engine(0);
        cold.observe(ThresholdKind::QueueDepth, 20.0);
        std::thread::sleep(Duration::from_millis(1100));
        assert!(cold.active().is_empty());
    }

    #[test]
    fn prune_drops_old_entries() {
        let engine = engine(0);
        engine.observe(ThresholdKind::QueueDepth, 20.0);
        assert_eq!(engine.prune(Duration::from_secs(3600)), 0);
        assert_eq!(engine.prune(Duration::ZERO), 1);
        assert_eq!(engine.alert_count(), 0);
    }

    #[test]
    fn export_contains_all_alerts() {
        let engine = engine(0);
        engine.observe(ThresholdKind::QueueDepth, 20.0);
        let export = engine.export_json();
        assert_eq!(export["alert_count"], 1);
        assert!(export["alerts"].as_array().unwrap().len() == 1);
    }
}

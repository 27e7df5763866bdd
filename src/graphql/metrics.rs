use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub calls: u64,
    pub attempts: u64,
    pub total_latency_ms: u64,
}

/// Per-process counters keyed by (operation, outcome). Not persisted.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    entries: Mutex<BTreeMap<(String, String), OperationStats>>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &str, outcome: &str, attempts: u32, latency: Duration) {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stats = guard
            .entry((operation.to_string(), outcome.to_string()))
            .or_default();
        stats.calls += 1;
        stats.attempts += u64::from(attempts);
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    pub fn snapshot(&self) -> Vec<MetricsRow> {
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .iter()
            .map(|((operation, outcome), stats)| MetricsRow {
                operation: operation.clone(),
                outcome: outcome.clone(),
                stats: stats.clone(),
            })
            .collect()
    }

    pub fn calls(&self, operation: &str, outcome: &str) -> u64 {
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get(&(operation.to_string(), outcome.to_string()))
            .map(|stats| stats.calls)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MetricsRow {
    pub operation: String,
    pub outcome: String,
    #[serde(flatten)]
    pub stats: OperationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_per_operation_and_outcome() {
        let metrics = ClientMetrics::new();
        metrics.record("listRequests", "ok", 1, Duration::from_millis(12));
        metrics.record("listRequests", "ok", 2, Duration::from_millis(30));
        metrics.record("listRequests", "network", 3, Duration::from_millis(5));

        assert_eq!(metrics.calls("listRequests", "ok"), 2);
        assert_eq!(metrics.calls("listRequests", "network"), 1);
        assert_eq!(metrics.calls("getRequests", "ok"), 0);

        let rows = metrics.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].outcome, "ok");
        assert_eq!(rows[1].stats.attempts, 3);
        assert_eq!(rows[1].stats.total_latency_ms, 42);
    }
}

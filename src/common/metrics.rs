//! Counters for the manager, exported in Prometheus text format

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for tracking event counts
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct ManagerMetrics {
    pub requests_total: Counter,
    pub parse_errors_total: Counter,
    pub no_storage_total: Counter,
    pub node_failures_total: Counter,
    pub rebalances_total: Counter,
    pub resyncs_total: Counter,
    pub wal_appends_total: Counter,
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render all counters plus the current node count
    pub fn to_prometheus(&self, nodes: usize) -> String {
        let counters: [(&str, &str, &Counter); 7] = [
            ("imdg_requests_total", "Client requests received", &self.requests_total),
            ("imdg_parse_errors_total", "Requests rejected by the parser", &self.parse_errors_total),
            ("imdg_no_storage_total", "Requests refused with no storage connected", &self.no_storage_total),
            ("imdg_node_failures_total", "Storage nodes removed after a failure", &self.node_failures_total),
            ("imdg_rebalances_total", "Completed range reassignments", &self.rebalances_total),
            ("imdg_resyncs_total", "Periodic full-log resync rounds", &self.resyncs_total),
            ("imdg_wal_appends_total", "Commands appended to the WAL", &self.wal_appends_total),
        ];

        let mut out = String::new();
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }
        let _ = writeln!(out, "# HELP imdg_storage_nodes Registered storage nodes");
        let _ = writeln!(out, "# TYPE imdg_storage_nodes gauge");
        let _ = writeln!(out, "imdg_storage_nodes {}", nodes);
        out
    }
}

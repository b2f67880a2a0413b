use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Moderation-layer prometheus metrics.
pub struct WardenMetrics {
    /// Records committed (persisted and replicated).
    pub records_committed: IntCounter,
    /// Records vetoed by an observer.
    pub records_cancelled: IntCounter,
    /// Replication messages handed to the transport.
    pub replication_sent: IntCounter,
    /// Replication messages currently queued across all destinations.
    pub replication_pending: IntGauge,
    /// Flush loops currently armed.
    pub flush_loops_active: IntGauge,
}

impl WardenMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let records_committed = IntCounter::with_opts(Opts::new(
            "warden_records_committed",
            "Records committed (persisted and replicated)",
        ))?;
        let records_cancelled = IntCounter::with_opts(Opts::new(
            "warden_records_cancelled",
            "Records vetoed by an observer",
        ))?;
        let replication_sent = IntCounter::with_opts(Opts::new(
            "warden_replication_sent",
            "Replication messages handed to the transport",
        ))?;
        let replication_pending = IntGauge::with_opts(Opts::new(
            "warden_replication_pending",
            "Replication messages currently queued",
        ))?;
        let flush_loops_active = IntGauge::with_opts(Opts::new(
            "warden_flush_loops_active",
            "Flush loops currently armed",
        ))?;

        registry.register(Box::new(records_committed.clone()))?;
        registry.register(Box::new(records_cancelled.clone()))?;
        registry.register(Box::new(replication_sent.clone()))?;
        registry.register(Box::new(replication_pending.clone()))?;
        registry.register(Box::new(flush_loops_active.clone()))?;

        Ok(Self {
            records_committed,
            records_cancelled,
            replication_sent,
            replication_pending,
            flush_loops_active,
        })
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self {
            records_committed: IntCounter::new("warden_records_committed", "committed")
                .expect("valid metric name"),
            records_cancelled: IntCounter::new("warden_records_cancelled", "cancelled")
                .expect("valid metric name"),
            replication_sent: IntCounter::new("warden_replication_sent", "sent")
                .expect("valid metric name"),
            replication_pending: IntGauge::new("warden_replication_pending", "pending")
                .expect("valid metric name"),
            flush_loops_active: IntGauge::new("warden_flush_loops_active", "active")
                .expect("valid metric name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_with_registry() {
        let registry = Registry::new();
        let metrics = WardenMetrics::new(&registry).unwrap();
        metrics.records_committed.inc();
        metrics.replication_pending.set(3);

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "warden_records_committed"));
    }

    #[test]
    fn unregistered_metrics_are_usable() {
        let metrics = WardenMetrics::unregistered();
        metrics.flush_loops_active.inc();
        metrics.flush_loops_active.dec();
        assert_eq!(metrics.flush_loops_active.get(), 0);
    }
}

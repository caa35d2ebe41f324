//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_servicepool::PoolMetrics;
///
/// let metrics = PoolMetrics::default();
/// let exported = metrics.export();
/// assert_eq!(exported["total_acquired"], "0");
/// assert_eq!(exported["utilization"], "0.00");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolMetrics {
    /// Successful acquisitions
    pub total_acquired: usize,

    /// Resources handed back to the pool
    pub total_released: usize,

    /// Resources built by the pool
    pub total_constructed: usize,

    /// Constructions that failed in the provider callback
    pub construction_failures: usize,

    /// Acquisitions that timed out
    pub exhausted_events: usize,

    /// Resources currently held by callers
    pub active_resources: usize,

    /// Resources constructed and waiting in the pool
    pub idle_resources: usize,

    /// Active resources relative to the instance count (0.0 to 1.0)
    pub utilization: f64,

    /// Instance count of the pool
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_constructed".to_string(), self.total_constructed.to_string());
        metrics.insert("construction_failures".to_string(), self.construction_failures.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("active_resources".to_string(), self.active_resources.to_string());
        metrics.insert("idle_resources".to_string(), self.idle_resources.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export the metrics of one or more pools in Prometheus exposition format.
    ///
    /// Each pool becomes a `pool` label value; `tags` are added as constant labels.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_servicepool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let pools = vec![("openai".to_string(), PoolMetrics::default())];
    /// let output = MetricsExporter::export_prometheus(&pools, Some(&tags)).unwrap();
    /// assert!(output.contains("servicepool_resources_active"));
    /// assert!(output.contains("pool=\"openai\""));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        pools: &[(String, PoolMetrics)],
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

        let registry = Registry::new();
        let const_labels = tags.cloned().unwrap_or_default();
        let opts = |name: &str, help: &str| {
            Opts::new(name, help).const_labels(const_labels.clone())
        };

        let gauges = [
            ("servicepool_resources_active", "Resources currently held by callers"),
            ("servicepool_resources_idle", "Constructed resources waiting in the pool"),
            ("servicepool_capacity", "Maximum concurrently held resources"),
        ];
        let counters = [
            ("servicepool_acquired_total", "Successful acquisitions"),
            ("servicepool_released_total", "Resources returned to the pool"),
            ("servicepool_constructed_total", "Resources constructed"),
            ("servicepool_construction_failures_total", "Failed constructions"),
            ("servicepool_exhausted_total", "Acquisitions that timed out"),
        ];

        let gauge_vecs = gauges
            .iter()
            .map(|&(name, help)| IntGaugeVec::new(opts(name, help), &["pool"]))
            .collect::<Result<Vec<_>, _>>()?;
        let counter_vecs = counters
            .iter()
            .map(|&(name, help)| IntCounterVec::new(opts(name, help), &["pool"]))
            .collect::<Result<Vec<_>, _>>()?;
        let utilization = GaugeVec::new(
            opts("servicepool_utilization", "Pool utilization ratio"),
            &["pool"],
        )?;

        for (pool, metrics) in pools {
            let label = [pool.as_str()];
            let gauge_values = [
                metrics.active_resources,
                metrics.idle_resources,
                metrics.max_capacity,
            ];
            for (vec, value) in gauge_vecs.iter().zip(gauge_values) {
                vec.with_label_values(&label).set(value as i64);
            }

            let counter_values = [
                metrics.total_acquired,
                metrics.total_released,
                metrics.total_constructed,
                metrics.construction_failures,
                metrics.exhausted_events,
            ];
            for (vec, value) in counter_vecs.iter().zip(counter_values) {
                vec.with_label_values(&label).inc_by(value as u64);
            }

            utilization.with_label_values(&label).set(metrics.utilization);
        }

        for vec in gauge_vecs {
            registry.register(Box::new(vec))?;
        }
        for vec in counter_vecs {
            registry.register(Box::new(vec))?;
        }
        registry.register(Box::new(utilization))?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_constructed: AtomicUsize,
    pub construction_failures: AtomicUsize,
    pub exhausted_events: AtomicUsize,
    pub active: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_acquired(&self) {
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.total_released.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, idle: usize, capacity: usize) -> PoolMetrics {
        let active = self.active.load(Ordering::Relaxed);
        let utilization = if capacity > 0 {
            active as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_constructed: self.total_constructed.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            active_resources: active,
            idle_resources: idle,
            utilization,
            max_capacity: capacity,
        }
    }
}

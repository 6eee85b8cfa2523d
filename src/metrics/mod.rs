use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for order processing
// ============================================================================
//
// - order status transitions (from, to)
// - failed commands (command, error kind)
// - estimated item runtimes in minutes
// - command latency
//
// No HTTP endpoint here: the surrounding web layer serves `render()`.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub order_transitions: IntCounterVec,
    pub commands_failed: IntCounterVec,
    pub estimated_runtime_minutes: Histogram,
    pub command_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let order_transitions = IntCounterVec::new(
            Opts::new("drone_order_transitions_total", "Order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let commands_failed = IntCounterVec::new(
            Opts::new("drone_order_commands_failed_total", "Order commands that returned an error"),
            &["command", "kind"],
        )?;
        registry.register(Box::new(commands_failed.clone()))?;

        let estimated_runtime_minutes = Histogram::with_opts(
            HistogramOpts::new(
                "drone_item_estimated_runtime_minutes",
                "Flight runtime written to items on completion",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 240.0, 480.0, 960.0]),
        )?;
        registry.register(Box::new(estimated_runtime_minutes.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new("drone_order_command_duration_seconds", "Order command duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        Ok(Self {
            registry,
            order_transitions,
            commands_failed,
            estimated_runtime_minutes,
            command_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_failure(&self, command: &str, kind: &str) {
        self.commands_failed.with_label_values(&[command, kind]).inc();
    }

    pub fn record_runtime(&self, minutes: i32) {
        self.estimated_runtime_minutes.observe(f64::from(minutes));
    }

    pub fn record_duration(&self, command: &str, duration_secs: f64) {
        self.command_duration.with_label_values(&[command]).observe(duration_secs);
    }

    /// Text exposition format of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

//! Metrics and tracing helpers.
//!
//! With the `metrics` feature an OpenTelemetry meter provider exports into a
//! Prometheus registry; [`gather_text`] renders it in the text exposition
//! format. With the `tracing` feature [`tracing_helpers`] provides the spans
//! wrapped around planning, execution and mapping.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::*;

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, TextEncoder};

    pub static METRICS: Lazy<RelidMetrics> = Lazy::new(RelidMetrics::init);

    pub struct RelidMetrics {
        pub registry: prometheus::Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub fragments_planned: Counter<u64>,
        pub mapping_errors: Counter<u64>,
    }

    impl RelidMetrics {
        pub fn init() -> Self {
            let registry = prometheus::Registry::new();
            let builder = SdkMeterProvider::builder();
            let builder = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => builder.with_reader(exporter),
                Err(e) => {
                    log::warn!("prometheus exporter unavailable, metrics stay in-process: {e}");
                    builder
                }
            };
            let provider = builder.build();
            let meter = provider.meter("relid");

            let queries_total = meter
                .u64_counter("relid_queries_total")
                .with_description("Total select queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("relid_query_errors_total")
                .with_description("Select queries that failed in the executor")
                .build();

            let query_duration = meter
                .f64_histogram("relid_query_duration_seconds")
                .with_description("Duration of select query execution")
                .build();

            let fragments_planned = meter
                .u64_counter("relid_fragments_planned_total")
                .with_description("Relation-id fragments attached to queries")
                .build();

            let mapping_errors = meter
                .u64_counter("relid_mapping_errors_total")
                .with_description("Relation-id values that failed conversion")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                fragments_planned,
                mapping_errors,
            }
        }

        pub fn record_query(&self, elapsed: std::time::Duration, ok: bool) {
            self.queries_total.add(1, &[]);
            if !ok {
                self.query_errors_total.add(1, &[]);
            }
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_planned(&self, fragments: usize) {
            self.fragments_planned.add(fragments as u64, &[]);
        }

        pub fn record_mapping_errors(&self, count: usize) {
            if count > 0 {
                self.mapping_errors.add(count as u64, &[]);
            }
        }
    }

    /// Render all collected metrics in the Prometheus text format.
    pub fn gather_text() -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&METRICS.registry.gather(), &mut buf) {
            log::warn!("failed to encode metrics: {e}");
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn plan_span(relation: &str) -> Span {
        info_span!("relid.plan", relation = %relation)
    }

    pub fn execute_span(sql: &str) -> Span {
        info_span!("relid.execute", sql_len = sql.len())
    }

    pub fn map_span(rows: usize, requests: usize) -> Span {
        info_span!("relid.map", rows, requests)
    }
}

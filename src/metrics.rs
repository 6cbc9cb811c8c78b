//! Metrics and tracing helpers.
//!
//! With the `metrics` feature, [`METRICS`] records transaction lifecycle
//! counters and query timings through OpenTelemetry, exported in Prometheus
//! format from [`ScopeMetrics::registry`]. With the `tracing` feature,
//! [`tracing_helpers`] builds the spans entered around transactions and
//! query execution.

#[cfg(feature = "metrics")]
pub use self::otel::{ScopeMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use std::time::Duration;

    pub static METRICS: Lazy<ScopeMetrics> = Lazy::new(ScopeMetrics::init);

    pub struct ScopeMetrics {
        pub registry: prometheus::Registry,
        pub provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub transactions_begun: Counter<u64>,
        pub transactions_committed: Counter<u64>,
        pub transactions_rolled_back: Counter<u64>,
    }

    impl ScopeMetrics {
        pub fn init() -> Self {
            let registry = prometheus::Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("lifeguard_scope");

            let queries_total = meter
                .u64_counter("lifeguard_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("lifeguard_query_errors_total")
                .with_description("Queries that returned an error")
                .build();

            let query_duration = meter
                .f64_histogram("lifeguard_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let transactions_begun = meter
                .u64_counter("lifeguard_transactions_begun_total")
                .with_description("Transactions opened by an outermost in_tx call")
                .build();

            let transactions_committed = meter
                .u64_counter("lifeguard_transactions_committed_total")
                .with_description("Transactions committed")
                .build();

            let transactions_rolled_back = meter
                .u64_counter("lifeguard_transactions_rolled_back_total")
                .with_description("Transactions rolled back")
                .build();

            Self {
                registry,
                provider,
                queries_total,
                query_errors_total,
                query_duration,
                transactions_begun,
                transactions_committed,
                transactions_rolled_back,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_transaction_begin(&self) {
            self.transactions_begun.add(1, &[]);
        }

        pub fn record_transaction_commit(&self) {
            self.transactions_committed.add(1, &[]);
        }

        pub fn record_transaction_rollback(&self) {
            self.transactions_rolled_back.add(1, &[]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    pub fn begin_transaction_span() -> Span {
        tracing::info_span!("lifeguard.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::info_span!("lifeguard.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::info_span!("lifeguard.transaction.rollback")
    }

    pub fn execute_query_span(query: &str) -> Span {
        tracing::debug_span!("lifeguard.query", sql = %query)
    }

    pub fn acquire_connection_span() -> Span {
        tracing::info_span!("lifeguard.connection.acquire")
    }
}

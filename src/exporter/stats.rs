use prometheus::{Histogram, HistogramOpts, HistogramTimer, IntCounterVec, IntGaugeVec, Opts, Registry};

use crate::built_info;

/// Request accounting for the metrics endpoint.
#[derive(Clone)]
pub struct HttpStats {
    requests_total: IntCounterVec,
    scrape_duration_seconds: Histogram,
}

impl Default for HttpStats {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpStats {
    #[must_use]
    #[allow(clippy::expect_used)]
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails.
    pub fn new() -> Self {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "lsf_exporter_http_requests_total",
                "Total number of metrics requests by HTTP status code",
            ),
            &["code"],
        )
        .expect("lsf_exporter_http_requests_total");

        let scrape_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "lsf_exporter_scrape_duration_seconds",
                "Time spent answering a metrics request in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )
        .expect("lsf_exporter_scrape_duration_seconds");

        Self {
            requests_total,
            scrape_duration_seconds,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the metrics are already registered with `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.requests_total.clone()))?;
        registry.register(Box::new(self.scrape_duration_seconds.clone()))?;
        Ok(())
    }

    pub fn record(&self, code: u16) {
        self.requests_total
            .with_label_values(&[code.to_string().as_str()])
            .inc();
    }

    /// Observes the elapsed time when dropped.
    #[must_use]
    pub fn start_scrape(&self) -> HistogramTimer {
        self.scrape_duration_seconds.start_timer()
    }

    #[must_use]
    pub fn requests(&self, code: u16) -> u64 {
        self.requests_total
            .with_label_values(&[code.to_string().as_str()])
            .get()
    }
}

/// Register `lsf_exporter_build_info`, a constant `1` labeled with build metadata.
///
/// # Errors
///
/// Returns an error if the gauge cannot be created or is already registered.
pub fn register_build_info(registry: &Registry) -> prometheus::Result<()> {
    let build_info = IntGaugeVec::new(
        Opts::new(
            "lsf_exporter_build_info",
            "A metric with a constant '1' value labeled by version, revision and rustc version of lsf_exporter.",
        ),
        &["version", "revision", "rustc"],
    )?;

    build_info
        .with_label_values(&[
            built_info::PKG_VERSION,
            built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown"),
            built_info::RUSTC_VERSION,
        ])
        .set(1);

    registry.register(Box::new(build_info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_record_by_code() {
        let stats = HttpStats::new();
        stats.record(200);
        stats.record(200);
        stats.record(400);

        assert_eq!(stats.requests(200), 2);
        assert_eq!(stats.requests(400), 1);
        assert_eq!(stats.requests(503), 0);
    }

    #[allow(clippy::unwrap_used)]
    fn render(registry: &Registry) -> String {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_scrape_timer_observes() {
        let registry = Registry::new();
        let stats = HttpStats::new();
        stats.register(&registry).unwrap();

        stats.start_scrape().observe_duration();

        assert!(render(&registry).contains("lsf_exporter_scrape_duration_seconds_count 1"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_build_info() {
        let registry = Registry::new();
        register_build_info(&registry).unwrap();

        let text = render(&registry);
        assert!(text.contains("lsf_exporter_build_info{"));
        assert!(text.contains(&format!("version=\"{}\"", env!("CARGO_PKG_VERSION"))));
    }
}

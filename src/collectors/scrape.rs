//! Scrape protocol over a set of named collectors.

use crate::collectors::Collector;
use crate::collectors::error::CollectorError;
use crate::collectors::metric::{Emitter, MetricDesc, Sample, ValueKind};
use futures::FutureExt as _;
use futures::future::join_all;
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info_span, warn};
use tracing_futures::Instrument as _;

/// Runs its collectors for each scrape and reports how each one did.
pub struct LsfCollector {
    collectors: Vec<Arc<dyn Collector>>,
    success: Arc<MetricDesc>,
    duration: Arc<MetricDesc>,
}

struct Outcome {
    name: &'static str,
    elapsed: f64,
    samples: Option<Vec<Sample>>,
}

async fn run(collector: &Arc<dyn Collector>) -> Outcome {
    let name = collector.name();
    let span = info_span!("collector.update", collector = name, otel.kind = "internal");
    let mut emitter = Emitter::new();
    let start = Instant::now();

    let result = AssertUnwindSafe(async { collector.update(&mut emitter).await })
        .catch_unwind()
        .instrument(span)
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    let samples = match result {
        Ok(Ok(())) => {
            debug!(collector = name, samples = emitter.len(), elapsed, "collector succeeded");
            Some(emitter.into_samples())
        }
        Ok(Err(e)) => {
            error!(collector = name, error = %e, elapsed, "collector failed");
            None
        }
        Err(_) => {
            error!(collector = name, elapsed, "collector panicked");
            None
        }
    };

    Outcome {
        name,
        elapsed,
        samples,
    }
}

impl LsfCollector {
    #[must_use]
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self {
            collectors,
            success: MetricDesc::new(
                "scrape",
                "collector_success",
                "lsf_exporter: Whether a collector succeeded.",
                &["collector"],
            ),
            duration: MetricDesc::new(
                "scrape",
                "collector_duration_seconds",
                "lsf_exporter: Duration of a collector scrape.",
                &["collector"],
            ),
        }
    }

    /// Names of the active collectors, in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Every descriptor that a scrape may emit against.
    #[must_use]
    pub fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.collectors
            .iter()
            .flat_map(|c| c.describe())
            .chain([Arc::clone(&self.success), Arc::clone(&self.duration)])
            .collect()
    }

    /// Run every collector concurrently and return the scrape's samples.
    ///
    /// A collector that fails or panics contributes no domain samples, but its
    /// success and duration gauges are always present.
    pub async fn collect(&self) -> Vec<Sample> {
        let outcomes = join_all(self.collectors.iter().map(run)).await;

        let mut emitter = Emitter::new();
        let mut samples = Vec::new();

        for outcome in outcomes {
            let success = if let Some(domain) = outcome.samples {
                samples.extend(domain);
                1.0
            } else {
                0.0
            };

            let meta = emitter
                .gauge(&self.success, success, &[outcome.name])
                .and_then(|()| emitter.gauge(&self.duration, outcome.elapsed, &[outcome.name]));
            if let Err(e) = meta {
                error!(collector = outcome.name, error = %e, "failed to emit scrape metrics");
            }
        }

        samples.extend(emitter.into_samples());
        samples
    }

    /// Collect and convert the samples into exposition families.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor is rejected by the prometheus client.
    pub async fn gather(&self) -> Result<Vec<MetricFamily>, CollectorError> {
        encode(&self.collect().await)
    }
}

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Turn one scrape's samples into metric families.
///
/// # Errors
///
/// Returns an error if a descriptor or label set is invalid.
pub fn encode(samples: &[Sample]) -> Result<Vec<MetricFamily>, CollectorError> {
    let registry = Registry::new();
    let mut families: HashMap<&str, Family> = HashMap::new();

    for sample in samples {
        let desc = sample.desc();
        let labels: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();

        if !families.contains_key(desc.fq_name()) {
            let opts = Opts::new(desc.fq_name(), desc.help());
            let family = match sample.kind() {
                ValueKind::Gauge => {
                    let vec = GaugeVec::new(opts, desc.labels())?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Gauge(vec)
                }
                ValueKind::Counter => {
                    let vec = CounterVec::new(opts, desc.labels())?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Counter(vec)
                }
            };
            families.insert(desc.fq_name(), family);
        }

        match (families.get(desc.fq_name()), sample.kind()) {
            (Some(Family::Gauge(vec)), ValueKind::Gauge) => {
                vec.get_metric_with_label_values(labels.as_slice())?.set(sample.value());
            }
            (Some(Family::Counter(vec)), ValueKind::Counter) => {
                vec.get_metric_with_label_values(labels.as_slice())?
                    .inc_by(sample.value().max(0.0));
            }
            _ => warn!(metric = desc.fq_name(), "sample kind differs from its family, skipping"),
        }
    }

    Ok(registry.gather())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;

    enum Behavior {
        Succeed,
        Fail,
        Panic,
        PanicEarly,
    }

    struct Fake {
        name: &'static str,
        behavior: Behavior,
        desc: Arc<MetricDesc>,
    }

    impl Fake {
        fn new(name: &'static str, behavior: Behavior) -> Arc<dyn Collector> {
            Arc::new(Self {
                name,
                behavior,
                desc: MetricDesc::new(name, "value", "test value", &["host_name"]),
            })
        }
    }

    impl Collector for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn describe(&self) -> Vec<Arc<MetricDesc>> {
            vec![Arc::clone(&self.desc)]
        }

        #[allow(clippy::panic)]
        fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
            if matches!(self.behavior, Behavior::PanicEarly) {
                panic!("collector bug before the future exists");
            }
            Box::pin(async move {
                emitter.gauge(&self.desc, 7.0, &["hostA"])?;
                match self.behavior {
                    Behavior::Succeed => Ok(()),
                    Behavior::Fail => Err(CollectorError::decode("csv", "broken row")),
                    Behavior::Panic | Behavior::PanicEarly => panic!("collector bug"),
                }
            })
        }
    }

    fn gauge_for<'a>(samples: &'a [Sample], metric: &str, collector: &str) -> Option<&'a Sample> {
        samples
            .iter()
            .find(|s| s.desc().fq_name() == metric && s.label("collector") == Some(collector))
    }

    #[tokio::test]
    async fn test_failing_collector_is_isolated() {
        let orchestrator = LsfCollector::new(vec![
            Fake::new("bad", Behavior::Fail),
            Fake::new("good", Behavior::Succeed),
        ]);

        let samples = orchestrator.collect().await;

        let success = "lsf_scrape_collector_success";
        assert_eq!(gauge_for(&samples, success, "bad").map(Sample::value), Some(0.0));
        assert_eq!(gauge_for(&samples, success, "good").map(Sample::value), Some(1.0));
        assert!(gauge_for(&samples, "lsf_scrape_collector_duration_seconds", "bad").is_some());

        assert!(!samples.iter().any(|s| s.desc().fq_name() == "lsf_bad_value"));
        assert!(samples.iter().any(|s| s.desc().fq_name() == "lsf_good_value"));
    }

    #[tokio::test]
    async fn test_panicking_collector_is_isolated() {
        let orchestrator = LsfCollector::new(vec![
            Fake::new("boom", Behavior::Panic),
            Fake::new("good", Behavior::Succeed),
        ]);

        let samples = orchestrator.collect().await;

        let success = "lsf_scrape_collector_success";
        assert_eq!(gauge_for(&samples, success, "boom").map(Sample::value), Some(0.0));
        assert_eq!(gauge_for(&samples, success, "good").map(Sample::value), Some(1.0));
    }

    #[tokio::test]
    async fn test_panic_while_building_update_is_isolated() {
        let orchestrator = LsfCollector::new(vec![
            Fake::new("early", Behavior::PanicEarly),
            Fake::new("good", Behavior::Succeed),
        ]);

        let samples = orchestrator.collect().await;

        let success = "lsf_scrape_collector_success";
        assert_eq!(gauge_for(&samples, success, "early").map(Sample::value), Some(0.0));
        assert_eq!(gauge_for(&samples, success, "good").map(Sample::value), Some(1.0));
        assert!(samples.iter().any(|s| s.desc().fq_name() == "lsf_good_value"));
    }

    #[test]
    fn test_describe_includes_scrape_descriptors() {
        let orchestrator = LsfCollector::new(vec![Fake::new("good", Behavior::Succeed)]);
        let names: Vec<String> = orchestrator
            .describe()
            .iter()
            .map(|d| d.fq_name().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "lsf_good_value",
                "lsf_scrape_collector_success",
                "lsf_scrape_collector_duration_seconds"
            ]
        );
        assert_eq!(orchestrator.names(), ["good"]);
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_gather_builds_families() {
        let orchestrator = LsfCollector::new(vec![
            Fake::new("good", Behavior::Succeed),
            Fake::new("bad", Behavior::Fail),
        ]);

        let families = orchestrator.gather().await.unwrap();
        let names: Vec<&str> = families.iter().map(MetricFamily::name).collect();
        assert!(names.contains(&"lsf_good_value"));
        assert!(!names.contains(&"lsf_bad_value"));

        let success = families
            .iter()
            .find(|f| f.name() == "lsf_scrape_collector_success")
            .unwrap();
        assert_eq!(success.get_metric().len(), 2);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_encode_counter_and_kind_conflict() {
        let desc = MetricDesc::new("bjobs", "pending_time_total", "pending", &["job_id"]);
        let samples = vec![
            Sample::new(&desc, ValueKind::Counter, 12.0, &["1"]).unwrap(),
            Sample::new(&desc, ValueKind::Gauge, 3.0, &["2"]).unwrap(),
        ];

        let families = encode(&samples).unwrap();
        assert_eq!(families.len(), 1);
        let family = families.first().unwrap();
        assert_eq!(family.get_metric().len(), 1);
        let value = family.get_metric().first().unwrap().get_counter().value.unwrap_or(0.0);
        assert_eq!(value, 12.0);
    }
}

use crate::collectors::Collector;
use crate::collectors::command::CommandRunner;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::mapping::host_status_code;
use crate::collectors::metric::{Emitter, MetricDesc};
use crate::collectors::parse::{csv, lenient};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "bhost";
const LABELS: &[&str] = &["host_name"];

/// One row of `bhosts -w -X`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostRecord {
    #[serde(rename = "HOST_NAME")]
    host_name: String,
    #[serde(rename = "STATUS")]
    status: String,
    #[serde(rename = "MAX", deserialize_with = "lenient::limit")]
    max: f64,
    #[serde(rename = "NJOBS", deserialize_with = "lenient::number")]
    njobs: f64,
    #[serde(rename = "RUN", deserialize_with = "lenient::number")]
    run: f64,
    #[serde(rename = "SSUSP", deserialize_with = "lenient::number")]
    ssusp: f64,
    #[serde(rename = "USUSP", deserialize_with = "lenient::number")]
    ususp: f64,
    #[serde(rename = "RSV", deserialize_with = "lenient::number")]
    rsv: f64,
}

/// Per-host job slot usage and batch daemon status.
pub struct HostsCollector {
    runner: Arc<dyn CommandRunner>,
    host_status: Arc<MetricDesc>,
    maxjob: Arc<MetricDesc>,
    njobs: Arc<MetricDesc>,
    running: Arc<MetricDesc>,
    ssusp: Arc<MetricDesc>,
    ususp: Arc<MetricDesc>,
    rsv: Arc<MetricDesc>,
}

impl HostsCollector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_runner(config.runner())
    }

    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            host_status: MetricDesc::new(
                SUBSYSTEM,
                "host_status",
                "The status of the host and the sbatchd daemon. 0:unknown, 1:ok, 2:unavail/closed_adm, 3:unreach, 4:closed/closed_excl/closed_full",
                LABELS,
            ),
            maxjob: MetricDesc::new(
                SUBSYSTEM,
                "maxjob_count",
                "The maximum number of job slots available. -1 indicates no limit.",
                LABELS,
            ),
            njobs: MetricDesc::new(
                SUBSYSTEM,
                "njobs_count",
                "The number of tasks for all jobs dispatched to the host, including running, suspended and chunk jobs.",
                LABELS,
            ),
            running: MetricDesc::new(
                SUBSYSTEM,
                "runningjob_count",
                "The number of tasks for all running jobs on the host.",
                LABELS,
            ),
            ssusp: MetricDesc::new(
                SUBSYSTEM,
                "ssuspjob_count",
                "The number of tasks for all system suspended jobs on the host.",
                LABELS,
            ),
            ususp: MetricDesc::new(
                SUBSYSTEM,
                "ususpjob_count",
                "The number of tasks for all user suspended jobs on the host.",
                LABELS,
            ),
            rsv: MetricDesc::new(
                SUBSYSTEM,
                "rsvjob_count",
                "The number of job slots reserved on the host for pending jobs.",
                LABELS,
            ),
        }
    }
}

impl Collector for HostsCollector {
    fn name(&self) -> &'static str {
        "bhosts"
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        vec![
            Arc::clone(&self.host_status),
            Arc::clone(&self.maxjob),
            Arc::clone(&self.njobs),
            Arc::clone(&self.running),
            Arc::clone(&self.ssusp),
            Arc::clone(&self.ususp),
            Arc::clone(&self.rsv),
        ]
    }

    #[instrument(skip(self, emitter), level = "info", err, fields(collector = "bhosts", otel.kind = "internal"))]
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
        Box::pin(async move {
            let output = self.runner.run("bhosts", &["-w", "-X"]).await?;
            let hosts: Vec<HostRecord> = csv::decode(&output)?;
            debug!(hosts = hosts.len(), "decoded bhosts output");

            for host in &hosts {
                let labels = [host.host_name.as_str()];
                emitter.gauge(&self.host_status, host_status_code(&host.status), &labels)?;
                emitter.gauge(&self.maxjob, host.max, &labels)?;
                emitter.gauge(&self.njobs, host.njobs, &labels)?;
                emitter.gauge(&self.running, host.run, &labels)?;
                emitter.gauge(&self.ssusp, host.ssusp, &labels)?;
                emitter.gauge(&self.ususp, host.ususp, &labels)?;
                emitter.gauge(&self.rsv, host.rsv, &labels)?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::collectors::command::testing::Canned;
    use crate::collectors::metric::Sample;

    async fn scrape(output: &str) -> Result<Vec<Sample>, CollectorError> {
        let collector = HostsCollector::with_runner(Arc::new(Canned::output(output)));
        let mut emitter = Emitter::new();
        collector.update(&mut emitter).await?;
        Ok(emitter.into_samples())
    }

    fn value(samples: &[Sample], metric: &str, host: &str) -> Option<f64> {
        samples
            .iter()
            .find(|s| s.desc().fq_name() == metric && s.label("host_name") == Some(host))
            .map(Sample::value)
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_host_status_and_running_jobs() {
        let samples = scrape("HOST_NAME STATUS MAX NJOBS RUN SSUSP USUSP RSV\nhostA ok 10 3 2 0 1 0\n")
            .await
            .unwrap();

        assert_eq!(value(&samples, "lsf_bhost_host_status", "hostA"), Some(1.0));
        assert_eq!(value(&samples, "lsf_bhost_runningjob_count", "hostA"), Some(2.0));
        assert_eq!(value(&samples, "lsf_bhost_njobs_count", "hostA"), Some(3.0));
        assert_eq!(value(&samples, "lsf_bhost_ususpjob_count", "hostA"), Some(1.0));
        assert_eq!(samples.len(), 7);
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_padded_wide_output() {
        let out = "HOST_NAME          STATUS          JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV   \n\
                   hostA              ok              -       16      4      4      0      0      0     \n\
                   hostB              closed_Full     -        -      0      0      0      0      0  \n\
                   hostC              unreach         -        8      0      0      0      0      0\n";
        let samples = scrape(out).await.unwrap();

        assert_eq!(value(&samples, "lsf_bhost_host_status", "hostB"), Some(4.0));
        assert_eq!(value(&samples, "lsf_bhost_maxjob_count", "hostB"), Some(-1.0));
        assert_eq!(value(&samples, "lsf_bhost_host_status", "hostC"), Some(3.0));
        assert_eq!(value(&samples, "lsf_bhost_maxjob_count", "hostA"), Some(16.0));
    }

    #[tokio::test]
    async fn test_labels_follow_descriptor_order() {
        let samples = scrape("HOST_NAME STATUS\nhostA ok\nhostB unavail\n")
            .await
            .unwrap_or_default();
        assert_eq!(samples.len(), 14);
        for sample in &samples {
            assert_eq!(sample.label_values().len(), sample.desc().labels().len());
        }
    }

    #[tokio::test]
    async fn test_malformed_row_fails_collector() {
        let res = scrape("HOST_NAME STATUS RUN\nhostA ok 1 2 3\n").await;
        assert!(matches!(res, Err(CollectorError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_command_failure_is_reported() {
        let collector = HostsCollector::with_runner(Arc::new(Canned::failing()));
        let mut emitter = Emitter::new();
        let res = collector.update(&mut emitter).await;
        assert!(matches!(res, Err(CollectorError::ExecutionFailed { .. })));
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_describe() {
        let collector = HostsCollector::with_runner(Arc::new(Canned::failing()));
        assert_eq!(collector.name(), "bhosts");
        assert_eq!(collector.describe().len(), 7);
    }
}

use crate::collectors::Collector;
use crate::collectors::command::CommandRunner;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::mapping::load_status_code;
use crate::collectors::metric::{Emitter, MetricDesc};
use crate::collectors::parse::csv::{self, CsvOptions};
use crate::collectors::util::{coerce_f64, coerce_percent, coerce_size_bytes};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "lsload";
const LABELS: &[&str] = &["host_name"];

/// One row of `lsload -w`. Values past a load threshold carry a leading `*`;
/// an unavailable host has no load indices at all.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoadRecord {
    #[serde(rename = "HOST_NAME")]
    host_name: String,
    status: String,
    r15s: String,
    r1m: String,
    r15m: String,
    ut: String,
    pg: String,
    ls: String,
    it: String,
    tmp: String,
    swp: String,
    mem: String,
}

fn unmark(raw: &str) -> &str {
    raw.trim().trim_start_matches('*')
}

/// Host load indices from the LIM.
pub struct LoadCollector {
    runner: Arc<dyn CommandRunner>,
    status: Arc<MetricDesc>,
    r15s: Arc<MetricDesc>,
    r1m: Arc<MetricDesc>,
    r15m: Arc<MetricDesc>,
    cpu_utilization: Arc<MetricDesc>,
    paging_rate: Arc<MetricDesc>,
    login_users: Arc<MetricDesc>,
    idle_time: Arc<MetricDesc>,
    tmp: Arc<MetricDesc>,
    swp: Arc<MetricDesc>,
    mem: Arc<MetricDesc>,
}

impl LoadCollector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_runner(config.runner())
    }

    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        let desc = |name: &str, help: &str| MetricDesc::new(SUBSYSTEM, name, help, LABELS);

        Self {
            runner,
            status: desc(
                "status",
                "The load status of the host. 0:unknown, 1:ok, 2:-ok/busy/lockW/lockU, 3:unavail, 4:unlicensed",
            ),
            r15s: desc("r15s", "The 15 second exponentially averaged CPU run queue length."),
            r1m: desc("r1m", "The 1 minute exponentially averaged CPU run queue length."),
            r15m: desc("r15m", "The 15 minute exponentially averaged CPU run queue length."),
            cpu_utilization: desc(
                "cpu_utilization_ratio",
                "The CPU utilization exponentially averaged over the last minute, between 0 and 1.",
            ),
            paging_rate: desc(
                "paging_rate",
                "The memory paging rate exponentially averaged over the last minute, in pages per second.",
            ),
            login_users: desc("login_users", "The number of current login users."),
            idle_time: desc(
                "idle_time_minutes",
                "The idle time of the host (keyboard not touched on all logged in sessions), in minutes.",
            ),
            tmp: desc("tmp_bytes", "The amount of free space in /tmp, in bytes."),
            swp: desc("swp_bytes", "The amount of available swap space, in bytes."),
            mem: desc("mem_bytes", "The amount of available RAM, in bytes."),
        }
    }
}

impl Collector for LoadCollector {
    fn name(&self) -> &'static str {
        "lsload"
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        [
            &self.status,
            &self.r15s,
            &self.r1m,
            &self.r15m,
            &self.cpu_utilization,
            &self.paging_rate,
            &self.login_users,
            &self.idle_time,
            &self.tmp,
            &self.swp,
            &self.mem,
        ]
        .into_iter()
        .map(Arc::clone)
        .collect()
    }

    #[instrument(skip(self, emitter), level = "info", err, fields(collector = "lsload", otel.kind = "internal"))]
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
        Box::pin(async move {
            let output = self.runner.run("lsload", &["-w"]).await?;
            let hosts: Vec<LoadRecord> = csv::decode_with(
                &output,
                CsvOptions {
                    pad_short: true,
                    ..CsvOptions::default()
                },
            )?;
            debug!(hosts = hosts.len(), "decoded lsload output");

            for host in &hosts {
                let labels = [host.host_name.as_str()];
                emitter.gauge(&self.status, load_status_code(&host.status), &labels)?;
                emitter.gauge(&self.r15s, coerce_f64(unmark(&host.r15s)), &labels)?;
                emitter.gauge(&self.r1m, coerce_f64(unmark(&host.r1m)), &labels)?;
                emitter.gauge(&self.r15m, coerce_f64(unmark(&host.r15m)), &labels)?;
                emitter.gauge(&self.cpu_utilization, coerce_percent(unmark(&host.ut)), &labels)?;
                emitter.gauge(&self.paging_rate, coerce_f64(unmark(&host.pg)), &labels)?;
                emitter.gauge(&self.login_users, coerce_f64(unmark(&host.ls)), &labels)?;
                emitter.gauge(&self.idle_time, coerce_f64(unmark(&host.it)), &labels)?;
                emitter.gauge(&self.tmp, coerce_size_bytes(unmark(&host.tmp)), &labels)?;
                emitter.gauge(&self.swp, coerce_size_bytes(unmark(&host.swp)), &labels)?;
                emitter.gauge(&self.mem, coerce_size_bytes(unmark(&host.mem)), &labels)?;
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

    const OUTPUT: &str = "\
HOST_NAME       status  r15s   r1m  r15m   ut    pg  ls    it   tmp   swp   mem  \n\
hostA               ok   0.5   1.0   0.8  35%   0.0   2    15  7.7G    2G  512M  \n\
hostB          unavail\n\
hostC            lockW  *9.5   8.0   7.1  98%   1.2   0     0  100M    0M    1G\n";

    fn value(samples: &[Sample], metric: &str, host: &str) -> Option<f64> {
        samples
            .iter()
            .find(|s| s.desc().fq_name() == metric && s.label("host_name") == Some(host))
            .map(Sample::value)
    }

    #[test]
    fn test_unmark() {
        assert_eq!(unmark("*9.5"), "9.5");
        assert_eq!(unmark(" 1.0"), "1.0");
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_load_indices() {
        let collector = LoadCollector::with_runner(Arc::new(Canned::output(OUTPUT)));
        let mut emitter = Emitter::new();
        collector.update(&mut emitter).await.unwrap();
        let samples = emitter.into_samples();

        assert_eq!(samples.len(), 33);
        assert_eq!(value(&samples, "lsf_lsload_status", "hostA"), Some(1.0));
        assert_eq!(value(&samples, "lsf_lsload_status", "hostB"), Some(3.0));
        assert_eq!(value(&samples, "lsf_lsload_status", "hostC"), Some(2.0));
        assert_eq!(value(&samples, "lsf_lsload_r1m", "hostA"), Some(1.0));
        assert_eq!(value(&samples, "lsf_lsload_r15s", "hostC"), Some(9.5));
        assert_eq!(value(&samples, "lsf_lsload_cpu_utilization_ratio", "hostA"), Some(0.35));
        assert_eq!(value(&samples, "lsf_lsload_login_users", "hostA"), Some(2.0));
        assert_eq!(
            value(&samples, "lsf_lsload_mem_bytes", "hostA"),
            Some(512.0 * 1024.0 * 1024.0)
        );
        assert_eq!(
            value(&samples, "lsf_lsload_mem_bytes", "hostC"),
            Some(1024.0 * 1024.0 * 1024.0)
        );
        assert_eq!(value(&samples, "lsf_lsload_tmp_bytes", "hostB"), Some(0.0));
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_unavailable_host_keeps_the_batch() {
        let output = "\
HOST_NAME status r15s r1m r15m ut pg ls it tmp swp mem\n\
hostN ok 0.0 0.1 0.2 5% 0.0 0 3 10G 2G 3G\n\
hostV unavail\n";
        let collector = LoadCollector::with_runner(Arc::new(Canned::output(output)));
        let mut emitter = Emitter::new();
        collector.update(&mut emitter).await.unwrap();
        let samples = emitter.into_samples();

        assert_eq!(samples.len(), 22);
        assert_eq!(value(&samples, "lsf_lsload_status", "hostN"), Some(1.0));
        assert_eq!(value(&samples, "lsf_lsload_status", "hostV"), Some(3.0));
        assert_eq!(value(&samples, "lsf_lsload_r1m", "hostV"), Some(0.0));
        assert_eq!(
            value(&samples, "lsf_lsload_mem_bytes", "hostN"),
            Some(3.0 * 1024.0 * 1024.0 * 1024.0)
        );
    }

    #[test]
    fn test_describe() {
        let collector = LoadCollector::with_runner(Arc::new(Canned::failing()));
        assert_eq!(collector.name(), "lsload");
        assert_eq!(collector.describe().len(), 11);
    }
}

use crate::collectors::Collector;
use crate::collectors::command::CommandRunner;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::mapping::server_code;
use crate::collectors::metric::{Emitter, MetricDesc};
use crate::collectors::parse::csv::{self, CsvOptions};
use crate::collectors::parse::lenient;
use crate::collectors::util::coerce_size_bytes;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "lshost";
const LABELS: &[&str] = &["host_name"];

/// One row of `lshosts -w`. RESOURCES is free text and always the last column.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostInventory {
    #[serde(rename = "HOST_NAME")]
    host_name: String,
    #[serde(rename = "type")]
    host_type: String,
    model: String,
    #[serde(deserialize_with = "lenient::number")]
    cpuf: f64,
    #[serde(deserialize_with = "lenient::number")]
    ncpus: f64,
    #[serde(deserialize_with = "lenient::number")]
    nprocs: f64,
    #[serde(deserialize_with = "lenient::number")]
    ncores: f64,
    #[serde(deserialize_with = "lenient::number")]
    nthreads: f64,
    maxmem: String,
    maxswp: String,
    server: String,
    #[serde(rename = "RESOURCES")]
    resources: String,
}

/// Static host configuration from `lshosts`; disabled by default.
pub struct InventoryCollector {
    runner: Arc<dyn CommandRunner>,
    info: Arc<MetricDesc>,
    cpu_factor: Arc<MetricDesc>,
    ncpus: Arc<MetricDesc>,
    nprocs: Arc<MetricDesc>,
    ncores: Arc<MetricDesc>,
    nthreads: Arc<MetricDesc>,
    maxmem: Arc<MetricDesc>,
    maxswp: Arc<MetricDesc>,
    server: Arc<MetricDesc>,
}

impl InventoryCollector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_runner(config.runner())
    }

    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        let desc = |name: &str, help: &str| MetricDesc::new(SUBSYSTEM, name, help, LABELS);

        Self {
            runner,
            info: MetricDesc::new(
                SUBSYSTEM,
                "info",
                "A metric with a constant '1' value labeled by host type, model and resources.",
                &["host_name", "host_type", "model", "resources"],
            ),
            cpu_factor: desc("cpu_factor", "The relative CPU performance factor of the host."),
            ncpus: desc("ncpus", "The number of processors on the host."),
            nprocs: desc("nprocs", "The number of physical processors (sockets) on the host."),
            ncores: desc("ncores", "The number of cores per processor on the host."),
            nthreads: desc("nthreads", "The number of threads per core on the host."),
            maxmem: desc("maxmem_bytes", "The maximum amount of physical memory available to user processes, in bytes."),
            maxswp: desc("maxswp_bytes", "The total available swap space, in bytes."),
            server: desc("server", "Whether the host runs batch jobs. 0:no, 1:yes, 2:dynamic"),
        }
    }
}

impl Collector for InventoryCollector {
    fn name(&self) -> &'static str {
        "lshosts"
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        [
            &self.info,
            &self.cpu_factor,
            &self.ncpus,
            &self.nprocs,
            &self.ncores,
            &self.nthreads,
            &self.maxmem,
            &self.maxswp,
            &self.server,
        ]
        .into_iter()
        .map(Arc::clone)
        .collect()
    }

    #[instrument(skip(self, emitter), level = "info", err, fields(collector = "lshosts", otel.kind = "internal"))]
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
        Box::pin(async move {
            let output = self.runner.run("lshosts", &["-w"]).await?;
            let hosts: Vec<HostInventory> = csv::decode_with(
                &output,
                CsvOptions {
                    merge_tail: true,
                    ..CsvOptions::default()
                },
            )?;
            debug!(hosts = hosts.len(), "decoded lshosts output");

            for host in &hosts {
                let labels = [host.host_name.as_str()];
                emitter.gauge(
                    &self.info,
                    1.0,
                    &[
                        host.host_name.as_str(),
                        host.host_type.as_str(),
                        host.model.as_str(),
                        host.resources.as_str(),
                    ],
                )?;
                emitter.gauge(&self.cpu_factor, host.cpuf, &labels)?;
                emitter.gauge(&self.ncpus, host.ncpus, &labels)?;
                emitter.gauge(&self.nprocs, host.nprocs, &labels)?;
                emitter.gauge(&self.ncores, host.ncores, &labels)?;
                emitter.gauge(&self.nthreads, host.nthreads, &labels)?;
                emitter.gauge(&self.maxmem, coerce_size_bytes(&host.maxmem), &labels)?;
                emitter.gauge(&self.maxswp, coerce_size_bytes(&host.maxswp), &labels)?;
                emitter.gauge(&self.server, server_code(&host.server), &labels)?;
            }

            Ok(())
        })
    }
}

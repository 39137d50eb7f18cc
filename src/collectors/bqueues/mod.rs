use crate::collectors::Collector;
use crate::collectors::command::CommandRunner;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::mapping::queue_status_code;
use crate::collectors::metric::{Emitter, MetricDesc};
use crate::collectors::parse::{csv, lenient};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "bqueues";
const LABELS: &[&str] = &["queue_name"];

/// One row of `bqueues -w`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueueRecord {
    #[serde(rename = "QUEUE_NAME")]
    queue_name: String,
    #[serde(rename = "PRIO", deserialize_with = "lenient::number")]
    priority: f64,
    #[serde(rename = "STATUS")]
    status: String,
    #[serde(rename = "MAX", deserialize_with = "lenient::limit")]
    max: f64,
    #[serde(rename = "JL/U", deserialize_with = "lenient::limit")]
    user_limit: f64,
    #[serde(rename = "JL/P", deserialize_with = "lenient::limit")]
    processor_limit: f64,
    #[serde(rename = "JL/H", deserialize_with = "lenient::limit")]
    host_limit: f64,
    #[serde(rename = "NJOBS", deserialize_with = "lenient::number")]
    njobs: f64,
    #[serde(rename = "PEND", deserialize_with = "lenient::number")]
    pend: f64,
    #[serde(rename = "RUN", deserialize_with = "lenient::number")]
    run: f64,
    #[serde(rename = "SUSP", deserialize_with = "lenient::number")]
    susp: f64,
    #[serde(rename = "RSV", deserialize_with = "lenient::number")]
    rsv: f64,
}

/// Queue priority, status, limits and job counts.
pub struct QueuesCollector {
    runner: Arc<dyn CommandRunner>,
    priority: Arc<MetricDesc>,
    status: Arc<MetricDesc>,
    maxjob: Arc<MetricDesc>,
    user_limit: Arc<MetricDesc>,
    processor_limit: Arc<MetricDesc>,
    host_limit: Arc<MetricDesc>,
    njobs: Arc<MetricDesc>,
    pend: Arc<MetricDesc>,
    run: Arc<MetricDesc>,
    susp: Arc<MetricDesc>,
    rsv: Arc<MetricDesc>,
}

impl QueuesCollector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_runner(config.runner())
    }

    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        let desc = |name: &str, help: &str| MetricDesc::new(SUBSYSTEM, name, help, LABELS);

        Self {
            runner,
            priority: desc("priority", "The priority of the queue. Higher values are scheduled first."),
            status: desc(
                "status",
                "The status of the queue. 0:unknown, 1:open:active, 2:open:inact, 3:closed:active, 4:closed:inact",
            ),
            maxjob: desc("maxjob_count", "The maximum number of job slots in the queue. -1 indicates no limit."),
            user_limit: desc("user_job_limit", "The job slot limit per user. -1 indicates no limit."),
            processor_limit: desc("processor_job_limit", "The job slot limit per processor. -1 indicates no limit."),
            host_limit: desc("host_job_limit", "The job slot limit per host. -1 indicates no limit."),
            njobs: desc("njobs_count", "The total number of tasks for jobs in the queue."),
            pend: desc("pendjob_count", "The number of tasks for pending jobs in the queue."),
            run: desc("runjob_count", "The number of tasks for running jobs in the queue."),
            susp: desc("suspjob_count", "The number of tasks for suspended jobs in the queue."),
            rsv: desc("rsvjob_count", "The number of job slots reserved for pending jobs in the queue."),
        }
    }
}

impl Collector for QueuesCollector {
    fn name(&self) -> &'static str {
        "bqueues"
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        [
            &self.priority,
            &self.status,
            &self.maxjob,
            &self.user_limit,
            &self.processor_limit,
            &self.host_limit,
            &self.njobs,
            &self.pend,
            &self.run,
            &self.susp,
            &self.rsv,
        ]
        .into_iter()
        .map(Arc::clone)
        .collect()
    }

    #[instrument(skip(self, emitter), level = "info", err, fields(collector = "bqueues", otel.kind = "internal"))]
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
        Box::pin(async move {
            let output = self.runner.run("bqueues", &["-w"]).await?;
            let queues: Vec<QueueRecord> = csv::decode(&output)?;
            debug!(queues = queues.len(), "decoded bqueues output");

            for queue in &queues {
                let labels = [queue.queue_name.as_str()];
                emitter.gauge(&self.priority, queue.priority, &labels)?;
                emitter.gauge(&self.status, queue_status_code(&queue.status), &labels)?;
                emitter.gauge(&self.maxjob, queue.max, &labels)?;
                emitter.gauge(&self.user_limit, queue.user_limit, &labels)?;
                emitter.gauge(&self.processor_limit, queue.processor_limit, &labels)?;
                emitter.gauge(&self.host_limit, queue.host_limit, &labels)?;
                emitter.gauge(&self.njobs, queue.njobs, &labels)?;
                emitter.gauge(&self.pend, queue.pend, &labels)?;
                emitter.gauge(&self.run, queue.run, &labels)?;
                emitter.gauge(&self.susp, queue.susp, &labels)?;
                emitter.gauge(&self.rsv, queue.rsv, &labels)?;
            }

            Ok(())
        })
    }
}

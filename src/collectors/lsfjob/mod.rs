use crate::collectors::Collector;
use crate::collectors::command::CommandRunner;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::mapping::SolverMap;
use crate::collectors::metric::{Emitter, MetricDesc};
use crate::collectors::parse::json;
use crate::collectors::util::coerce_f64;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, instrument};

pub mod job;
use job::{FIELDS, Job, LABELS};

const SUBSYSTEM: &str = "bjobs";

/// Key of the record count in the `bjobs -json` envelope.
const COUNT_KEY: &str = "JOBS";

/// Per-job slot requests and pending times for all users.
pub struct JobsCollector {
    runner: Arc<dyn CommandRunner>,
    solvers: SolverMap,
    ncpu: Arc<MetricDesc>,
    pending: Arc<MetricDesc>,
    pending_eligible: Arc<MetricDesc>,
    pending_ineligible: Arc<MetricDesc>,
}

impl JobsCollector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        let solvers = SolverMap::load(config.solver_map.as_deref());
        Self::with_runner(config.runner(), solvers)
    }

    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>, solvers: SolverMap) -> Self {
        Self {
            runner,
            solvers,
            ncpu: MetricDesc::new(
                SUBSYSTEM,
                "ncpu_count",
                "Minimum number of processors requested by the job.",
                LABELS,
            ),
            pending: MetricDesc::new(
                SUBSYSTEM,
                "pending_time_total",
                "Job pending time since submission (sec)",
                LABELS,
            ),
            pending_eligible: MetricDesc::new(
                SUBSYSTEM,
                "pending_time_eligible_total",
                "Job eligible pending time since submission (sec)",
                LABELS,
            ),
            pending_ineligible: MetricDesc::new(
                SUBSYSTEM,
                "pending_time_ineligible_total",
                "Job ineligible pending time since submission (sec)",
                LABELS,
            ),
        }
    }

    fn emit(&self, emitter: &mut Emitter, job: &Job) -> Result<(), CollectorError> {
        let solver = self.solvers.standardize(job.solver_key());
        debug!(
            job_id = %job.id,
            application = %job.application,
            queue = %job.queue,
            solver,
            "standardized solver"
        );

        let labels = job.label_values(solver);
        emitter.gauge(&self.ncpu, coerce_f64(&job.nproc), &labels)?;
        emitter.counter(&self.pending, coerce_f64(&job.pend_time), &labels)?;
        emitter.counter(&self.pending_eligible, coerce_f64(&job.eligible_pend_time), &labels)?;
        emitter.counter(&self.pending_ineligible, coerce_f64(&job.ineligible_pend_time), &labels)?;
        Ok(())
    }
}

impl Collector for JobsCollector {
    fn name(&self) -> &'static str {
        "lsfjob"
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        vec![
            Arc::clone(&self.ncpu),
            Arc::clone(&self.pending),
            Arc::clone(&self.pending_eligible),
            Arc::clone(&self.pending_ineligible),
        ]
    }

    #[instrument(skip(self, emitter), level = "info", err, fields(collector = "lsfjob", otel.kind = "internal"))]
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
        Box::pin(async move {
            let output = self
                .runner
                .run("bjobs", &["-X", "-u", "all", "-o", FIELDS, "-json"])
                .await?;
            let jobs: Vec<Job> = json::decode(&output, COUNT_KEY)?;
            debug!(jobs = jobs.len(), "decoded bjobs output");

            for job in &jobs {
                self.emit(emitter, job)?;
            }

            Ok(())
        })
    }
}

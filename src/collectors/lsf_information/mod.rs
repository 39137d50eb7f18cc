use crate::collectors::Collector;
use crate::collectors::command::CommandRunner;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::metric::{Emitter, MetricDesc};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

#[allow(clippy::expect_used)]
static CLUSTER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"My cluster name is (\S+)").expect("valid cluster name regex"));

#[allow(clippy::expect_used)]
static MASTER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"My (?:master|management host) name is (\S+)").expect("valid master name regex")
});

#[allow(clippy::expect_used)]
static VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"LSF\s+(?:[A-Za-z]+\s+)*(\d+(?:\.\d+)+)").expect("valid LSF version regex")
});

/// Cluster identity as printed by `lsid`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub cluster_name: String,
    pub master_name: String,
    pub version: String,
}

impl ClusterIdentity {
    /// Extract the identity; lines that are missing leave their field empty.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Self {
            cluster_name: capture(&CLUSTER_NAME),
            master_name: capture(&MASTER_NAME),
            version: capture(&VERSION),
        }
    }
}

/// Constant `1` labeled with the cluster name, master host and LSF version.
pub struct InformationCollector {
    runner: Arc<dyn CommandRunner>,
    info: Arc<MetricDesc>,
}

impl InformationCollector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_runner(config.runner())
    }

    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            info: MetricDesc::new(
                "cluster",
                "info",
                "A metric with a constant '1' value labeled by clustername, mastername and version of IBM Spectrum LSF.",
                &["clustername", "mastername", "version"],
            ),
        }
    }
}

impl Collector for InformationCollector {
    fn name(&self) -> &'static str {
        "lsf_information"
    }

    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        vec![Arc::clone(&self.info)]
    }

    #[instrument(skip(self, emitter), level = "info", err, fields(collector = "lsf_information", otel.kind = "internal"))]
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>> {
        Box::pin(async move {
            let output = self.runner.run("lsid", &[]).await?;
            let identity = ClusterIdentity::parse(&String::from_utf8_lossy(&output));
            debug!(
                cluster_name = %identity.cluster_name,
                master_name = %identity.master_name,
                version = %identity.version,
                "parsed lsid output"
            );

            emitter.gauge(
                &self.info,
                1.0,
                &[
                    identity.cluster_name.as_str(),
                    identity.master_name.as_str(),
                    identity.version.as_str(),
                ],
            )?;

            Ok(())
        })
    }
}

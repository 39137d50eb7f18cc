//! Metric descriptors and the per-scrape samples emitted against them.

use crate::collectors::error::CollectorError;
use std::sync::Arc;

/// Namespace shared by every metric the collectors expose.
pub const NAMESPACE: &str = "lsf";

/// Join non-empty name parts with `_`.
#[must_use]
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Gauge,
    Counter,
}

/// Immutable name, help text and ordered label schema of one metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    fq_name: String,
    help: String,
    labels: Vec<&'static str>,
}

impl MetricDesc {
    #[must_use]
    pub fn new(subsystem: &str, name: &str, help: &str, labels: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            fq_name: build_fq_name(NAMESPACE, subsystem, name),
            help: help.to_string(),
            labels: labels.to_vec(),
        })
    }

    #[must_use]
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    #[must_use]
    pub fn labels(&self) -> &[&'static str] {
        &self.labels
    }
}

/// One value with its label assignment, valid for a single scrape.
#[derive(Clone, Debug)]
pub struct Sample {
    desc: Arc<MetricDesc>,
    kind: ValueKind,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    /// Build a sample, checking the label values line up with the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::LabelCardinality`] when the number of values
    /// differs from the number of declared labels.
    pub fn new(
        desc: &Arc<MetricDesc>,
        kind: ValueKind,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self, CollectorError> {
        if label_values.len() != desc.labels.len() {
            return Err(CollectorError::LabelCardinality {
                metric: desc.fq_name.clone(),
                expected: desc.labels.len(),
                got: label_values.len(),
            });
        }

        Ok(Self {
            desc: Arc::clone(desc),
            kind,
            value,
            label_values: label_values.iter().map(|v| (*v).to_string()).collect(),
        })
    }

    #[must_use]
    pub fn desc(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Look up a label value by its declared name.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Sample buffer handed to one collector for one scrape.
///
/// The orchestrator only publishes the buffer when the collector's update
/// returns `Ok`, so a failing collector never leaks partial results.
#[derive(Debug, Default)]
pub struct Emitter {
    samples: Vec<Sample>,
}

impl Emitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a gauge sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the label values do not match the descriptor.
    pub fn gauge(
        &mut self,
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), CollectorError> {
        self.samples
            .push(Sample::new(desc, ValueKind::Gauge, value, label_values)?);
        Ok(())
    }

    /// Emit a counter sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the label values do not match the descriptor.
    pub fn counter(
        &mut self,
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), CollectorError> {
        self.samples
            .push(Sample::new(desc, ValueKind::Counter, value, label_values)?);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

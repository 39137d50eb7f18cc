use crate::collectors::error::CollectorError;
use crate::collectors::metric::{Emitter, MetricDesc};
use futures::future::BoxFuture;
use std::sync::Arc;

#[macro_use]
mod register_macro;

/// One polled domain of LSF state: one command, one family of descriptors.
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Descriptors this collector emits against, fixed at construction.
    fn describe(&self) -> Vec<Arc<MetricDesc>>;

    /// Run the command and emit this scrape's samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or its output cannot be decoded;
    /// anything already emitted is then discarded by the caller.
    fn update<'a>(&'a self, emitter: &'a mut Emitter) -> BoxFuture<'a, Result<(), CollectorError>>;
}

pub mod command;
pub mod config;
pub mod error;
pub mod mapping;
pub mod metric;
pub mod parse;
pub mod util;

register_collectors! {
    bhosts => HostsCollector: true,
    bqueues => QueuesCollector: true,
    lsfjob => JobsCollector: true,
    lsf_information => InformationCollector: true,
    lsload => LoadCollector: true,
    lshosts => InventoryCollector: false,
}

pub mod registry;
pub mod scrape;

pub use registry::CollectorRegistry;
pub use scrape::LsfCollector;

//! Table of named collectors and the rules deciding which of them run.

use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::scrape::LsfCollector;
use crate::collectors::{Collector, register_builtin};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds one collector instance from the shared settings.
pub type Factory = fn(&CollectorConfig) -> Result<Arc<dyn Collector>, CollectorError>;

#[derive(Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub factory: Factory,
    pub default_enabled: bool,
}

/// Registrations in the order they were made, plus the enable/disable
/// decisions taken from the command line.
///
/// Built once at start-up and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    registrations: Vec<Registration>,
    defaults_disabled: bool,
    overrides: HashMap<&'static str, bool>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl CollectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in LSF collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in table itself is inconsistent.
    pub fn with_builtin() -> Result<Self, CollectorError> {
        let mut registry = Self::new();
        register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Add a collector.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::DuplicateCollector`] if `name` is taken and
    /// [`CollectorError::InvalidCollectorName`] if it is not lowercase
    /// `[a-z0-9_]+`.
    pub fn register(
        &mut self,
        name: &'static str,
        factory: Factory,
        default_enabled: bool,
    ) -> Result<(), CollectorError> {
        if !valid_name(name) {
            return Err(CollectorError::InvalidCollectorName(name));
        }
        if self.registrations.iter().any(|r| r.name == name) {
            return Err(CollectorError::DuplicateCollector(name));
        }

        debug!(collector = name, default_enabled, "registered collector");
        self.registrations.push(Registration {
            name,
            factory,
            default_enabled,
        });
        Ok(())
    }

    /// Treat every collector as disabled unless explicitly enabled.
    pub fn disable_defaults(&mut self) {
        self.defaults_disabled = true;
    }

    /// Explicitly enable or disable one collector.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::UnknownCollector`] if `name` is not registered.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), CollectorError> {
        let name = self.find(name)?.name;
        self.overrides.insert(name, enabled);
        Ok(())
    }

    /// Effective enabled flag: an explicit toggle wins over the default.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.registrations
            .iter()
            .find(|r| r.name == name)
            .is_some_and(|r| self.effective(r))
    }

    fn effective(&self, registration: &Registration) -> bool {
        self.overrides
            .get(registration.name)
            .copied()
            .unwrap_or(registration.default_enabled && !self.defaults_disabled)
    }

    /// All registrations, in registration order.
    #[must_use]
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.registrations.iter().map(|r| r.name).collect()
    }

    fn find(&self, name: &str) -> Result<&Registration, CollectorError> {
        self.registrations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| CollectorError::UnknownCollector(name.to_string()))
    }

    /// Registrations to run for one scrape.
    ///
    /// An empty filter selects every enabled collector. Otherwise exactly the
    /// named ones are selected, enabled or not, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::UnknownCollector`] for the first filter entry
    /// that names no registration.
    pub fn resolve(&self, filters: &[String]) -> Result<Vec<&Registration>, CollectorError> {
        if filters.is_empty() {
            return Ok(self
                .registrations
                .iter()
                .filter(|r| self.effective(r))
                .collect());
        }

        for name in filters {
            self.find(name)?;
        }

        Ok(self
            .registrations
            .iter()
            .filter(|r| filters.iter().any(|f| f == r.name))
            .collect())
    }

    /// Construct one collector by name.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is unknown or its factory fails.
    pub fn instantiate(
        &self,
        name: &str,
        config: &CollectorConfig,
    ) -> Result<Arc<dyn Collector>, CollectorError> {
        (self.find(name)?.factory)(config)
    }

    /// Build an orchestrator over the resolved set.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is invalid or a factory fails.
    pub fn build(
        &self,
        config: &CollectorConfig,
        filters: &[String],
    ) -> Result<LsfCollector, CollectorError> {
        let collectors = self
            .resolve(filters)?
            .into_iter()
            .map(|r| (r.factory)(config))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LsfCollector::new(collectors))
    }
}

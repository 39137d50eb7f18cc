use crate::collectors::command::{CommandRunner, LsfCommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Settings shared by every collector built for one exporter process.
#[derive(Clone, Debug, Default)]
pub struct CollectorConfig {
    pub solver_map: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub command_timeout: Option<Duration>,
}

impl CollectorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_solver_map(mut self, path: Option<PathBuf>) -> Self {
        self.solver_map = path;
        self
    }

    #[must_use]
    pub fn with_bin_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bin_dir = dir;
        self
    }

    /// `None` or a zero duration waits for commands without limit.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Command runner spawning the real LSF tools.
    #[must_use]
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::new(LsfCommand::new(self.bin_dir.clone(), self.command_timeout))
    }
}

use prometheus::{Gauge, IntGauge, Opts, Registry};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, System};
use tracing::{debug, warn};

/// Resource usage of the `lsf_exporter` process itself.
///
/// LSF commands are short-lived children, so this mostly tracks the
/// exporter's own footprint between scrapes.
#[derive(Clone)]
pub struct ProcessMetrics {
    cpu_percent: Gauge,
    cpu_cores: IntGauge,
    resident_memory_bytes: IntGauge,
    virtual_memory_bytes: IntGauge,
    open_fds: IntGauge,
    start_time_seconds: Gauge,
    system: Arc<Mutex<SystemState>>,
    pid: Pid,
}

struct SystemState {
    system: System,
    last_refresh: Option<Instant>,
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMetrics {
    #[must_use]
    #[allow(clippy::expect_used)]
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails.
    pub fn new() -> Self {
        let cpu_percent = Gauge::with_opts(Opts::new(
            "lsf_exporter_process_cpu_percent",
            "Current CPU usage percentage (matches ps %cpu, can exceed 100%)",
        ))
        .expect("lsf_exporter_process_cpu_percent");

        let cpu_cores = IntGauge::with_opts(Opts::new(
            "lsf_exporter_process_cpu_cores",
            "Number of CPU cores available on the system",
        ))
        .expect("lsf_exporter_process_cpu_cores");

        let resident_memory_bytes = IntGauge::with_opts(Opts::new(
            "lsf_exporter_process_resident_memory_bytes",
            "Resident memory size in bytes (RSS)",
        ))
        .expect("lsf_exporter_process_resident_memory_bytes");

        let virtual_memory_bytes = IntGauge::with_opts(Opts::new(
            "lsf_exporter_process_virtual_memory_bytes",
            "Virtual memory size in bytes (VSZ)",
        ))
        .expect("lsf_exporter_process_virtual_memory_bytes");

        let open_fds = IntGauge::with_opts(Opts::new(
            "lsf_exporter_process_open_fds",
            "Number of open file descriptors",
        ))
        .expect("lsf_exporter_process_open_fds");

        let start_time_seconds = Gauge::with_opts(Opts::new(
            "lsf_exporter_process_start_time_seconds",
            "Start time of the process since unix epoch in seconds",
        ))
        .expect("lsf_exporter_process_start_time_seconds");

        let mut system = System::new();
        system.refresh_cpu_all();
        cpu_cores.set(i64::try_from(system.cpus().len().max(1)).unwrap_or(0));

        start_time_seconds.set(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64(),
        );

        Self {
            cpu_percent,
            cpu_cores,
            resident_memory_bytes,
            virtual_memory_bytes,
            open_fds,
            start_time_seconds,
            system: Arc::new(Mutex::new(SystemState {
                system,
                last_refresh: None,
            })),
            pid: Pid::from(std::process::id() as usize),
        }
    }

    /// Add the process gauges to `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a gauge with the same name is already registered.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.cpu_percent.clone()))?;
        registry.register(Box::new(self.cpu_cores.clone()))?;
        registry.register(Box::new(self.resident_memory_bytes.clone()))?;
        registry.register(Box::new(self.virtual_memory_bytes.clone()))?;
        registry.register(Box::new(self.open_fds.clone()))?;
        registry.register(Box::new(self.start_time_seconds.clone()))?;
        Ok(())
    }

    /// Refresh the gauges; CPU usage only moves once per sysinfo interval.
    pub fn update(&self) {
        let now = Instant::now();

        let mut state = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("System mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        let cpu_due = state
            .last_refresh
            .is_none_or(|last| now.duration_since(last) >= sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        if cpu_due {
            state.system.refresh_all();
            state.last_refresh = Some(now);
        }

        let Some(process) = state.system.process(self.pid) else {
            return;
        };

        if cpu_due {
            self.cpu_percent.set(f64::from(process.cpu_usage()));
        }

        let rss = process.memory();
        let vsz = process.virtual_memory();
        self.resident_memory_bytes.set(i64::try_from(rss).unwrap_or(0));
        self.virtual_memory_bytes.set(i64::try_from(vsz).unwrap_or(0));

        #[cfg(target_os = "linux")]
        {
            if let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", self.pid)) {
                self.open_fds.set(i64::try_from(entries.count()).unwrap_or(0));
            }
        }

        debug!(
            cpu_percent = self.cpu_percent.get(),
            rss_mb = rss / 1024 / 1024,
            vsz_mb = vsz / 1024 / 1024,
            fds = self.open_fds.get(),
            "collected process metrics"
        );
    }
}

use crate::{
    cli::actions::Action,
    collectors::{COLLECTOR_NAMES, CollectorRegistry, config::CollectorConfig},
    exporter::ExporterSettings,
};
use anyhow::{Result, anyhow, bail};
use clap::{ArgMatches, parser::ValueSource};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// # Errors
///
/// Returns an error if required arguments are missing, the telemetry path is
/// unusable or the collector table is inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    // Get the port or return an error
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // Get the listen address (None means auto-detect)
    let listen = matches
        .get_one::<String>("listen")
        .map(std::string::ToString::to_string);

    let telemetry_path = telemetry_path(
        matches
            .get_one::<String>("web.telemetry-path")
            .map_or("/metrics", String::as_str),
    )?;

    let registry = build_registry(matches)?;
    info!("Enabled collectors: {:?}", get_enabled_collectors(&registry));

    let config = CollectorConfig::new()
        .with_solver_map(matches.get_one::<PathBuf>("lsf.std-solver-config").cloned())
        .with_bin_dir(matches.get_one::<PathBuf>("lsf.bin-dir").cloned())
        .with_command_timeout(
            matches
                .get_one::<u64>("lsf.command-timeout")
                .map(|secs| Duration::from_secs(*secs)),
        );

    let settings = ExporterSettings::new(registry, config)
        .with_telemetry_path(telemetry_path)
        .with_exporter_metrics(!matches.get_flag("web.disable-exporter-metrics"))
        .with_max_requests(matches.get_one::<usize>("web.max-requests").copied().unwrap_or(40));

    Ok(Action::Run {
        port,
        listen,
        settings,
    })
}

/// Leading slash enforced; `/health` is reserved.
fn telemetry_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let path = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if path == "/health" {
        bail!("--web.telemetry-path cannot be /health, it is used by the health check");
    }

    Ok(path)
}

/// Built-in registry with the `--collector.*` toggles applied.
///
/// An explicit `--collector.<name>` only counts when given on the command
/// line, so `--collector.disable-defaults` is not undone by the flag defaults.
///
/// # Errors
///
/// Returns an error if the built-in collector table is inconsistent.
pub fn build_registry(matches: &ArgMatches) -> Result<CollectorRegistry> {
    let mut registry = CollectorRegistry::with_builtin()?;

    if matches.get_flag("collector.disable-defaults") {
        registry.disable_defaults();
    }

    for &name in COLLECTOR_NAMES {
        let enable_flag = format!("collector.{name}");
        let disable_flag = format!("no-collector.{name}");

        if matches.get_flag(&disable_flag) {
            registry.set_enabled(name, false)?;
        } else if matches.value_source(&enable_flag) == Some(ValueSource::CommandLine)
            && matches.get_flag(&enable_flag)
        {
            registry.set_enabled(name, true)?;
        }
    }

    Ok(registry)
}

#[must_use]
pub fn get_enabled_collectors(registry: &CollectorRegistry) -> Vec<&'static str> {
    registry
        .names()
        .into_iter()
        .filter(|name| registry.is_enabled(name))
        .collect()
}

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

use crate::built_info;
use actions::Action;
use anyhow::Result;
use nix::unistd::Uid;
use telemetry::Telemetry;
use tracing::{info, warn};

/// Parse the command line, install logging and work out what to run.
///
/// # Errors
///
/// Returns an error if telemetry cannot be set up or the arguments do not
/// describe a runnable exporter.
pub fn start() -> Result<(Action, Telemetry)> {
    let matches = commands::new().get_matches();

    let level = matches
        .get_one::<String>("log.level")
        .map_or("info", String::as_str);
    let telemetry = telemetry::init(
        level,
        matches.get_one::<String>("otel.endpoint").map(String::as_str),
    )?;

    info!(
        version = built_info::PKG_VERSION,
        revision = built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown"),
        "starting lsf_exporter"
    );

    if Uid::effective().is_root() {
        warn!("lsf_exporter is running as root; LSF commands will run with root privileges");
    }

    let action = dispatch::handler(&matches)?;

    Ok((action, telemetry))
}

pub mod collectors;

use crate::built_info;
use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;

pub use collectors::add_collectors_args;

fn long_version() -> &'static str {
    let commit = built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown");
    Box::leak(
        format!(
            "{} (revision {commit}, {})",
            built_info::PKG_VERSION,
            built_info::RUSTC_VERSION
        )
        .into_boxed_str(),
    )
}

/// Command line of the exporter.
#[must_use]
pub fn new() -> Command {
    let cmd = Command::new("lsf_exporter")
        .about("IBM Spectrum LSF metric exporter for Prometheus")
        .version(built_info::PKG_VERSION)
        .long_version(long_version())
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9818")
                .env("LSF_EXPORTER_PORT")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .help("IP address to bind, e.g. 127.0.0.1 or ::1 [default: [::], falling back to 0.0.0.0]")
                .env("LSF_EXPORTER_LISTEN"),
        )
        .arg(
            Arg::new("web.telemetry-path")
                .long("web.telemetry-path")
                .help("Path under which to expose metrics")
                .default_value("/metrics")
                .env("LSF_EXPORTER_TELEMETRY_PATH"),
        )
        .arg(
            Arg::new("web.disable-exporter-metrics")
                .long("web.disable-exporter-metrics")
                .help("Exclude process and HTTP metrics about the exporter itself")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("web.max-requests")
                .long("web.max-requests")
                .help("Maximum number of parallel scrape requests, 0 disables the limit")
                .default_value("40")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("collector.disable-defaults")
                .long("collector.disable-defaults")
                .help("Set all collectors to disabled by default")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("lsf.std-solver-config")
                .long("lsf.std-solver-config")
                .help("CSV file mapping application or queue names to a standard solver name")
                .env("LSF_STD_SOLVER_CONFIG")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("lsf.bin-dir")
                .long("lsf.bin-dir")
                .help("Directory holding the LSF commands [default: search PATH]")
                .env("LSF_BINDIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("lsf.command-timeout")
                .long("lsf.command-timeout")
                .help("Seconds to wait for an LSF command, 0 waits forever")
                .default_value("60")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("log.level")
                .long("log.level")
                .help("Log level, overridden by RUST_LOG")
                .default_value("info")
                .env("LSF_EXPORTER_LOG_LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("otel.endpoint")
                .long("otel.endpoint")
                .help("OTLP gRPC endpoint for traces, e.g. http://localhost:4317")
                .env("OTEL_EXPORTER_OTLP_ENDPOINT"),
        );

    add_collectors_args(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "LSF_EXPORTER_PORT",
                "LSF_EXPORTER_LISTEN",
                "LSF_EXPORTER_TELEMETRY_PATH",
                "LSF_STD_SOLVER_CONFIG",
                "LSF_BINDIR",
                "LSF_EXPORTER_LOG_LEVEL",
                "OTEL_EXPORTER_OTLP_ENDPOINT",
            ],
            || {
                let matches = new().try_get_matches_from(["lsf_exporter"]).unwrap();

                assert_eq!(matches.get_one::<u16>("port").copied(), Some(9818));
                assert!(matches.get_one::<String>("listen").is_none());
                assert_eq!(
                    matches.get_one::<String>("web.telemetry-path").map(String::as_str),
                    Some("/metrics")
                );
                assert_eq!(matches.get_one::<usize>("web.max-requests").copied(), Some(40));
                assert_eq!(matches.get_one::<u64>("lsf.command-timeout").copied(), Some(60));
                assert_eq!(
                    matches.get_one::<String>("log.level").map(String::as_str),
                    Some("info")
                );
                assert!(!matches.get_flag("web.disable-exporter-metrics"));
                assert!(!matches.get_flag("collector.disable-defaults"));
                assert!(matches.get_one::<PathBuf>("lsf.bin-dir").is_none());
            },
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_env_vars() {
        temp_env::with_vars(
            [
                ("LSF_EXPORTER_PORT", Some("9999")),
                ("LSF_BINDIR", Some("/opt/lsf/10.1/linux3.10-glibc2.17-x86_64/bin")),
                ("LSF_STD_SOLVER_CONFIG", Some("/etc/lsf_exporter/solvers.csv")),
            ],
            || {
                let matches = new().try_get_matches_from(["lsf_exporter"]).unwrap();

                assert_eq!(matches.get_one::<u16>("port").copied(), Some(9999));
                assert_eq!(
                    matches.get_one::<PathBuf>("lsf.bin-dir").map(PathBuf::as_path),
                    Some(Path::new("/opt/lsf/10.1/linux3.10-glibc2.17-x86_64/bin"))
                );
                assert_eq!(
                    matches.get_one::<PathBuf>("lsf.std-solver-config").map(PathBuf::as_path),
                    Some(Path::new("/etc/lsf_exporter/solvers.csv"))
                );
            },
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_flag_wins_over_env() {
        temp_env::with_var("LSF_EXPORTER_PORT", Some("9999"), || {
            let matches = new()
                .try_get_matches_from(["lsf_exporter", "--port", "9100"])
                .unwrap();
            assert_eq!(matches.get_one::<u16>("port").copied(), Some(9100));
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(new().try_get_matches_from(["lsf_exporter", "--port", "70000"]).is_err());
        assert!(new().try_get_matches_from(["lsf_exporter", "--log.level", "loud"]).is_err());
        assert!(
            new()
                .try_get_matches_from(["lsf_exporter", "--lsf.command-timeout", "-1"])
                .is_err()
        );
    }

    #[test]
    fn test_command_is_consistent() {
        new().debug_assert();
    }
}

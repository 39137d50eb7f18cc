use crate::collectors::COLLECTORS;
use clap::{Arg, Command};

/// Add `--collector.<name>` and `--no-collector.<name>` for every built-in collector.
pub fn add_collectors_args(mut cmd: Command) -> Command {
    for &(name, default_enabled) in COLLECTORS {
        let enable_flag: &'static str = Box::leak(format!("collector.{name}").into_boxed_str());
        let disable_flag: &'static str = Box::leak(format!("no-collector.{name}").into_boxed_str());

        let default_indicator = if default_enabled {
            " [default: enabled]"
        } else {
            " [default: disabled]"
        };
        let enable_help: &'static str =
            Box::leak(format!("Enable the {name} collector{default_indicator}").into_boxed_str());
        let disable_help: &'static str =
            Box::leak(format!("Disable the {name} collector").into_boxed_str());

        cmd = cmd
            .arg(
                Arg::new(enable_flag)
                    .long(enable_flag)
                    .help(enable_help)
                    .action(clap::ArgAction::SetTrue)
                    .default_value(if default_enabled { "true" } else { "false" }),
            )
            .arg(
                Arg::new(disable_flag)
                    .long(disable_flag)
                    .help(disable_help)
                    .action(clap::ArgAction::SetTrue)
                    .overrides_with(enable_flag),
            );
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use crate::cli::dispatch::build_registry;
    use crate::collectors::COLLECTOR_NAMES;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_all_collector_flags_are_added() {
        let cmd = commands::new();

        for &name in COLLECTOR_NAMES {
            let enable_flag = format!("collector.{name}");
            let disable_flag = format!("no-collector.{name}");

            let matches = cmd.clone().try_get_matches_from(vec!["lsf_exporter"]).unwrap();

            assert!(matches.contains_id(&enable_flag), "Missing enable flag for {name}");
            assert!(matches.contains_id(&disable_flag), "Missing disable flag for {name}");
        }
    }

    #[test]
    fn test_collector_default_values() {
        let matches = commands::new().get_matches_from(vec!["lsf_exporter"]);

        for &(name, expected_default) in COLLECTORS {
            let actual_value = matches.get_flag(&format!("collector.{name}"));
            assert_eq!(
                actual_value, expected_default,
                "Collector '{name}' default mismatch: expected {expected_default}, got {actual_value}"
            );
        }
    }

    #[test]
    fn test_disable_flag_overrides_enable_flag() {
        let matches = commands::new().get_matches_from(vec![
            "lsf_exporter",
            "--collector.bhosts",
            "--no-collector.bhosts",
        ]);

        assert!(matches.get_flag("no-collector.bhosts"));
    }

    #[test]
    fn test_enable_flag_after_disable_flag() {
        let matches = commands::new().get_matches_from(vec![
            "lsf_exporter",
            "--no-collector.bhosts",
            "--collector.bhosts",
        ]);

        assert!(matches.get_flag("collector.bhosts"));
        assert!(!matches.get_flag("no-collector.bhosts"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_collector_toggle_behavior_in_dispatch() {
        let cmd = commands::new();

        let matches = cmd.clone().get_matches_from(vec![
            "lsf_exporter",
            "--collector.bhosts",
            "--no-collector.bhosts",
        ]);
        let registry = build_registry(&matches).unwrap();
        assert!(
            !registry.is_enabled("bhosts"),
            "bhosts should be disabled when disable flag comes last"
        );

        let matches = cmd.get_matches_from(vec![
            "lsf_exporter",
            "--no-collector.bhosts",
            "--collector.bhosts",
        ]);
        let registry = build_registry(&matches).unwrap();
        assert!(registry.is_enabled("bhosts"));
    }
}

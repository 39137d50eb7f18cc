//! Translation of LSF strings into metric values and stable label values.
//!
//! The numeric status scales are part of the exporter's contract: dashboards
//! compare them numerically, so existing codes never change meaning.

use crate::collectors::util::record_solver_miss;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, error};

/// Label value used when no solver mapping applies.
pub const UNKNOWN: &str = "unknown";

/// `bhosts` STATUS: 0 unknown, 1 ok, 2 unavail/closed by admin, 3 unreachable, 4 closed.
#[must_use]
pub fn host_status_code(status: &str) -> f64 {
    match status.trim().to_ascii_lowercase().as_str() {
        "ok" => 1.0,
        "unavail" | "closed_adm" => 2.0,
        "unreach" | "unreachable" => 3.0,
        "closed" | "closed_excl" | "closed_full" | "closed_cu_excl" => 4.0,
        _ => 0.0,
    }
}

/// `bqueues` STATUS: 0 unknown, 1 open:active, 2 open:inact, 3 closed:active, 4 closed:inact.
#[must_use]
pub fn queue_status_code(status: &str) -> f64 {
    match status.trim().to_ascii_lowercase().as_str() {
        "open:active" => 1.0,
        "open:inact" => 2.0,
        "closed:active" => 3.0,
        "closed:inact" => 4.0,
        _ => 0.0,
    }
}

/// `lsload` status: 0 unknown, 1 ok, 2 busy or locked, 3 unavail, 4 unlicensed.
#[must_use]
pub fn load_status_code(status: &str) -> f64 {
    match status.trim().to_ascii_lowercase().as_str() {
        "ok" => 1.0,
        "-ok" | "busy" | "lockw" | "locku" => 2.0,
        "unavail" => 3.0,
        "unlicensed" => 4.0,
        _ => 0.0,
    }
}

/// `lshosts` server column: 0 no, 1 yes, 2 dynamic.
#[must_use]
pub fn server_code(server: &str) -> f64 {
    match server.trim().to_ascii_lowercase().as_str() {
        "yes" => 1.0,
        "dyn" => 2.0,
        _ => 0.0,
    }
}

/// Case-insensitive mapping of application/queue names to a standard solver label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolverMap {
    entries: HashMap<String, String>,
}

impl SolverMap {
    /// Load `key,value` lines from `path`.
    ///
    /// A missing path or unreadable file yields an empty map; lines without
    /// a comma are skipped.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        debug!(path = %path.display(), "loading solver mapping file");
        match File::open(path) {
            Ok(file) => {
                let map = Self::from_reader(BufReader::new(file));
                debug!(path = %path.display(), count = map.len(), "loaded solver mappings");
                map
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open solver mapping file");
                Self::default()
            }
        }
    }

    /// Parse mappings from any line source; read errors stop parsing and keep what was read.
    pub fn from_reader<R: BufRead>(reader: R) -> Self {
        let mut entries = HashMap::new();

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "error reading solver mapping file");
                    break;
                }
            };

            match line.split_once(',') {
                Some((key, value)) => {
                    entries.insert(key.trim().to_lowercase(), value.trim().to_string());
                }
                None => debug!(line = %line, "skipping solver mapping line without a comma"),
            }
        }

        Self { entries }
    }

    /// Standard label for a raw application or queue name, `unknown` when unmapped.
    #[must_use]
    pub fn standardize(&self, raw: &str) -> &str {
        match self.entries.get(&raw.trim().to_lowercase()) {
            Some(label) if !label.is_empty() => label,
            _ => {
                record_solver_miss();
                UNKNOWN
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Shared value coercions for collectors:
//! - Lenient string-to-number parsing where a bad value becomes `0.0`.
//! - Process-wide counters that make those silent substitutions visible.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use tracing::debug;

/// Incremented every time a raw value is replaced by zero.
#[allow(clippy::expect_used)]
static COERCION_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lsf_exporter_coercion_fallbacks_total",
            "Number of unparsable LSF values exported as 0, by value kind",
        ),
        &["kind"],
    )
    .expect("valid lsf_exporter_coercion_fallbacks_total metric")
});

/// Incremented every time a solver lookup falls back to `unknown`.
#[allow(clippy::expect_used)]
static SOLVER_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "lsf_exporter_solver_mapping_misses_total",
        "Number of job samples whose solver label fell back to unknown",
    )
    .expect("valid lsf_exporter_solver_mapping_misses_total metric")
});

/// Register the fallback counters with the exporter's own registry.
///
/// # Errors
///
/// Returns an error if the counters are already registered with `registry`.
pub fn register_fallback_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(COERCION_FALLBACKS.clone()))?;
    registry.register(Box::new(SOLVER_MISSES.clone()))?;
    Ok(())
}

/// Current fallback count for a value kind.
#[must_use]
pub fn coercion_fallbacks(kind: &str) -> u64 {
    COERCION_FALLBACKS.with_label_values(&[kind]).get()
}

#[must_use]
pub fn solver_mapping_misses() -> u64 {
    SOLVER_MISSES.get()
}

pub(crate) fn record_solver_miss() {
    SOLVER_MISSES.inc();
}

fn record_fallback(kind: &str, raw: &str) {
    debug!(kind, raw, "unparsable value exported as 0");
    COERCION_FALLBACKS.with_label_values(&[kind]).inc();
}

/// `""` and `-` are how LSF prints "no value"; they are zero but not a parse failure.
#[must_use]
pub fn is_blank(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == "-"
}

/// Parse a number, falling back to `0.0` (and counting it) on failure.
#[must_use]
pub fn coerce_f64(raw: &str) -> f64 {
    if is_blank(raw) {
        return 0.0;
    }
    raw.trim().parse::<f64>().unwrap_or_else(|_| {
        record_fallback("numeric", raw);
        0.0
    })
}

/// Job-slot limits: `-` means unlimited and is exported as `-1`.
#[must_use]
pub fn coerce_limit(raw: &str) -> f64 {
    if raw.trim() == "-" {
        return -1.0;
    }
    coerce_f64(raw)
}

/// `35%` (or a bare `35`) becomes the ratio `0.35`.
#[must_use]
pub fn coerce_percent(raw: &str) -> f64 {
    if is_blank(raw) {
        return 0.0;
    }
    let digits = raw.trim().trim_end_matches('%');
    digits.parse::<f64>().map_or_else(
        |_| {
            record_fallback("percent", raw);
            0.0
        },
        |v| v / 100.0,
    )
}

/// LSF size strings (`512M`, `7.7G`, `1T`) in bytes; a bare number is megabytes.
#[must_use]
pub fn coerce_size_bytes(raw: &str) -> f64 {
    const KIB: f64 = 1024.0;

    if is_blank(raw) {
        return 0.0;
    }
    let trimmed = raw.trim();
    let (digits, multiplier) = match trimmed.chars().last().filter(char::is_ascii_alphabetic) {
        Some(unit) => {
            let multiplier = match unit.to_ascii_uppercase() {
                'K' => KIB,
                'M' => KIB * KIB,
                'G' => KIB * KIB * KIB,
                'T' => KIB * KIB * KIB * KIB,
                'P' => KIB * KIB * KIB * KIB * KIB,
                _ => {
                    record_fallback("size", raw);
                    return 0.0;
                }
            };
            (trimmed.trim_end_matches(unit), multiplier)
        }
        None => (trimmed, KIB * KIB),
    };

    digits.parse::<f64>().map_or_else(
        |_| {
            record_fallback("size", raw);
            0.0
        },
        |v| v * multiplier,
    )
}

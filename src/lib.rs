pub mod cli;
pub mod collectors;
pub mod exporter;

/// Build-time metadata generated by `built`.
#[allow(clippy::pedantic)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

//! Turning command output into typed records.

pub mod csv;
pub mod json;
pub mod lenient;
pub mod normalize;

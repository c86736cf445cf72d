//! Export of recorded traces. Each format sits behind its own cargo feature.

#[cfg(feature = "csv")]
pub mod csv;

pub mod aggregate;
pub mod config;
pub mod decode;
pub mod error;
pub mod header;
pub mod measurement;
pub mod plot;
pub mod run;
pub mod stats;
pub mod table;
pub mod util;

/// Bytes to GiB
pub const GIB_SCALE: f64 = 1.0 / 1_073_741_824.0;
/// Nanoseconds to milliseconds
pub const NS_TO_MS_SCALE: f64 = 1.0 / 1_000_000.0;

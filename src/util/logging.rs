//! Standardized logging utility for Tioga
//!
//! This module provides the `tlog!` macro which ensures all demo-binary
//! logs follow the `YYYY-MM-DD HH:MM:SS [MODULE] Message` format.

#[macro_export]
macro_rules! tlog {
    ($module:expr, $($arg:tt)*) => {{
        let now = chrono::Local::now();
        eprintln!("{} [{}] {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            $module,
            format!($($arg)*)
        );
    }};
}

/// Standardized module identifiers
pub const MAIN: &str = "MAIN";
pub const BACKEND: &str = "BACKEND";
pub const BRIDGE: &str = "BRIDGE";
pub const OUTPUT: &str = "OUTPUT";
pub const PIPELINE: &str = "PIPELINE";
pub const INPUT: &str = "INPUT";
pub const HOST: &str = "HOST";

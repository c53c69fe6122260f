//! Conditional logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Every module that uses them defines two constants:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//! const LOG_TARGET: &str = "trust_monitor::history";
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("history for {} stored", device_id);
//! ```
//! Setting `ENABLE_LOGS` to `false` silences a noisy module without touching
//! the global `RUST_LOG` filter; `LOG_TARGET` keeps the records filterable.

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!(target: LOG_TARGET, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!(target: LOG_TARGET, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!(target: LOG_TARGET, $($arg)*);
        }
    };
}

/// Errors are still routed through the module switch so a test module can
/// mute expected failures.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!(target: LOG_TARGET, $($arg)*);
        }
    };
}

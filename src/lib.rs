/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("helmfile", "Writing {}", path.display());
/// log_status!("preinstall", "Verifying namespace {}", ns);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {{
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    }};
}

/// Warnings are always written to stderr, terminal or not.
#[macro_export]
macro_rules! log_warn {
    ($prefix:expr, $($arg:tt)*) => {{
        eprintln!(concat!("[", $prefix, "] warning: {}"), format_args!($($arg)*));
    }};
}

/// Debug lines, enabled with `JX_DEBUG=true`.
#[macro_export]
macro_rules! log_debug {
    ($prefix:expr, $($arg:tt)*) => {{
        if ::std::env::var("JX_DEBUG").map(|v| v == "true").unwrap_or(false) {
            eprintln!(concat!("[", $prefix, "] debug: {}"), format_args!($($arg)*));
        }
    }};
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `jx::requirements` instead of `jx::core::requirements`
pub use core::*;
pub use utils::*;

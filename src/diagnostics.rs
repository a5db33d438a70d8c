//! Verbosity-toggled diagnostic trace lines.
//!
//! The resolver and fetcher narrate what they try and why it failed. With
//! `verbose` on, those lines are emitted at `info`/`warn`; with it off they
//! drop to `debug`, so they stay available under `RUST_LOG=debug` without
//! cluttering normal output.
//!
//! The macros take the verbosity flag first, then regular `tracing` syntax:
//!
//! ```ignore
//! diag_info!(request.verbose, strategy = "http", resolved = %url, "Resolved");
//! diag_warn!(request.verbose, error = %e, "HTML resolve failed");
//! ```

/// `tracing::info!` when `$verbose`, `tracing::debug!` otherwise.
#[macro_export]
macro_rules! diag_info {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            ::tracing::info!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}

/// `tracing::warn!` when `$verbose`, `tracing::debug!` otherwise.
#[macro_export]
macro_rules! diag_warn {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            ::tracing::warn!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}

//! 日志初始化：基于 tracing-subscriber 的环境变量过滤。
//!
//! Tracing bootstrap for binaries and tests.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the embedding application. [`init_tracing`] is a convenience for
//! binaries that want the usual stderr output.

use std::env;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "JLPT_LOG";

/// Install a global fmt subscriber writing to stderr.
///
/// Filter precedence: `JLPT_LOG`, then `RUST_LOG`, then `default_directive`.
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter_from_env(default_directive))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

fn filter_from_env(default_directive: &str) -> EnvFilter {
    if let Some(filter) = env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
    {
        return filter;
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_subscriber() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("debug"));
    }
}

//! Logging setup for floodwatch.
//!
//! Feed fetches, camera failures, model verdicts and overrides are reported
//! through `tracing`. The binary installs one subscriber at startup; its
//! level comes from the `-v`/`-q` flags unless `RUST_LOG` is set.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much floodwatch itself reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only, including from dependencies.
    Quiet,
    /// Requests, overrides and analysis results.
    #[default]
    Normal,
    /// Adds cache hits and per-camera fetch results.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// The most detailed level emitted by the floodwatch crate.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// The filter used when `RUST_LOG` is unset.
///
/// Dependencies stay at warn so reqwest and hyper don't drown the request log.
fn default_filter(verbosity: Verbosity) -> String {
    let deps = if verbosity == Verbosity::Quiet {
        "error"
    } else {
        "warn"
    };
    format!(
        "{deps},floodwatch={}",
        verbosity.level().as_str().to_lowercase()
    )
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, replaces the verbosity-derived filter entirely.
/// Calling this more than once is harmless; later calls are ignored.
///
/// ```no_run
/// use floodwatch::{init_logging, logging::Verbosity};
///
/// // Show cache hits and camera fetch results
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

/// Send warnings from tests through the test harness's captured output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Verbosity; 4] = [
        Verbosity::Quiet,
        Verbosity::Normal,
        Verbosity::Verbose,
        Verbosity::Trace,
    ];

    #[test]
    fn test_verbosity_level() {
        assert_eq!(Verbosity::Quiet.level(), Level::ERROR);
        assert_eq!(Verbosity::Normal.level(), Level::INFO);
        assert_eq!(Verbosity::Verbose.level(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.level(), Level::TRACE);
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(Verbosity::Quiet), "error,floodwatch=error");
        assert_eq!(default_filter(Verbosity::Normal), "warn,floodwatch=info");
        assert_eq!(default_filter(Verbosity::Verbose), "warn,floodwatch=debug");
        assert_eq!(default_filter(Verbosity::Trace), "warn,floodwatch=trace");
    }

    #[test]
    fn test_default_filter_parses() {
        for verbosity in ALL {
            let filter = EnvFilter::try_new(default_filter(verbosity)).unwrap();
            assert!(filter.to_string().contains("floodwatch="));
        }
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Quiet);
        init_test_logging();
    }
}

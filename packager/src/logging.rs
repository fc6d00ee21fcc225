//! Diagnostic logging to standard error.
//!
//! Progress messages go through [`crate::output::Progress`]; the `log`
//! macros carry warnings and debugging detail. Records are forwarded to a
//! `tracing-subscriber` formatter writing to stderr. `RUST_LOG` takes
//! precedence when set; otherwise the verbosity flags pick the level:
//! warnings by default, then info, debug, and trace.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Map `-v` occurrences and `--quiet` to a level filter.
///
/// # Examples
///
/// ```
/// use native_packager::logging::level_for;
/// use tracing_subscriber::filter::LevelFilter;
///
/// assert_eq!(level_for(0, false), LevelFilter::WARN);
/// assert_eq!(level_for(2, false), LevelFilter::DEBUG);
/// assert_eq!(level_for(0, true), LevelFilter::ERROR);
/// ```
#[must_use]
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Filter used when `RUST_LOG` is not set.
#[must_use]
pub fn default_filter(verbosity: u8, quiet: bool) -> EnvFilter {
    EnvFilter::default().add_directive(level_for(verbosity, quiet).into())
}

/// Install the stderr subscriber for this process.
///
/// Installing twice is harmless; the first subscriber stays active.
pub fn init(verbosity: u8, quiet: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity, quiet));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, LevelFilter::WARN)]
    #[case(1, LevelFilter::INFO)]
    #[case(2, LevelFilter::DEBUG)]
    #[case(3, LevelFilter::TRACE)]
    #[case(9, LevelFilter::TRACE)]
    fn verbosity_maps_to_level(#[case] verbosity: u8, #[case] expected: LevelFilter) {
        assert_eq!(level_for(verbosity, false), expected);
    }

    #[test]
    fn quiet_keeps_errors_only() {
        assert_eq!(level_for(3, true), LevelFilter::ERROR);
    }

    #[rstest]
    #[case(0, false, "warn")]
    #[case(1, false, "info")]
    #[case(3, false, "trace")]
    #[case(2, true, "error")]
    fn default_filter_follows_flags(
        #[case] verbosity: u8,
        #[case] quiet: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(
            default_filter(verbosity, quiet).to_string().to_ascii_lowercase(),
            expected
        );
    }

    #[test]
    fn log_records_reach_the_subscriber() {
        init(1, false);
        assert!(log::log_enabled!(log::Level::Warn));
    }
}

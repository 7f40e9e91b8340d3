//! Tracing setup shared by the binaries.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives applied on top of `RUST_LOG`.
const DEFAULT_DIRECTIVES: &[&str] = &["sview=info", "hyper=warn", "reqwest=warn"];

/// Check if `LOG_FORMAT=json` was requested.
pub fn json_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn env_filter() -> EnvFilter {
    DEFAULT_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for rendered output. Calling this twice is a no-op.
pub fn init_tracing() {
    let filter = env_filter();

    let result = if json_requested() {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for directive in DEFAULT_DIRECTIVES {
            assert!(directive.parse::<Directive>().is_ok(), "{}", directive);
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}

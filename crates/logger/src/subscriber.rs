use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing at `INFO` unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with(LevelFilter::INFO);
}

/// Initialize tracing with `level` as the default directive.
///
/// `RUST_LOG` still wins over `level`. `RUST_LOG_FORMAT=json` switches the
/// output to JSON lines, anything else gives the compact format.
pub fn init_with(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_filter(env_filter)
            .boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_target(false).with_filter(env_filter).boxed(),
    };

    if let Err(error) = tracing_subscriber::registry().with(log_layer).try_init() {
        warn!("Tracing subscriber already installed: {error}");
    }
}

/// Map a `-v` count to a level: 0 -> info, 1 -> debug, 2+ -> trace.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(1), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(2), LevelFilter::TRACE);
        assert_eq!(level_from_verbosity(9), LevelFilter::TRACE);
    }
}

//! Tracing initialisation for chainlab binaries.
//!
//! Without `RUST_LOG`, only the chainlab crates log at the requested level;
//! everything else is held to `warn`. Every remote exec runs inside a
//! `chainlab.exec` span, and closing it logs the exec's duration.

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const CHAINLAB_TARGETS: [&str; 3] = ["chainlab", "chainlab_core", "chainlab_chain"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_filter(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        CHAINLAB_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.as_str().to_lowercase())),
    );
    directives.join(",")
}

/// Install the global subscriber. Later calls are ignored.
///
/// * `json` - newline-delimited JSON carrying the current span's fields
///   (container, step) on every line.
/// * `level` - verbosity for the chainlab crates when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let output: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(output)
        .with(env_filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_scopes_chainlab_crates() {
        let filter = default_filter(Level::DEBUG);
        assert_eq!(
            filter,
            "warn,chainlab=debug,chainlab_core=debug,chainlab_chain=debug"
        );
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
        tracing::info!("still logging");
    }
}

//! Log formatting for the recipe bot workspace.
//!
//! [`layer`] renders events from the workspace crates only (targets listed in
//! [`WORKSPACE_TARGETS`]); [`env_filter`] builds the global filter from
//! `RUST_LOG` with a fallback.

use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Crate target prefix of this library.
pub const TARGET_PREFIX: &str = "ai_llm_service";

/// Targets rendered by [`layer`].
pub const WORKSPACE_TARGETS: [&str; 5] =
    [TARGET_PREFIX, "rag_store", "contextor", "api", "recipe_bot"];

/// RFC3339 UTC timer, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let s = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Compact single-line layer for workspace events.
///
/// Span close events are logged so instrumented calls report their duration.
/// ANSI colors only when stdout is a terminal.
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let workspace_only = filter::filter_fn(|meta| {
        WORKSPACE_TARGETS
            .iter()
            .any(|prefix| meta.target().starts_with(prefix))
    });

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_ansi(io::stdout().is_terminal())
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(workspace_only)
}

/// Directive like `ai_llm_service=debug`.
pub fn level_directive(target: &str, level: Level) -> Result<Directive, ParseError> {
    format!("{target}={}", level.as_str().to_lowercase()).parse()
}

/// `RUST_LOG` if set and valid, otherwise `default`, with `ai_llm_service`
/// raised to `level`.
pub fn env_filter(default: &str, level: Level) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    match level_directive(TARGET_PREFIX, level) {
        Ok(d) => base.add_directive(d),
        Err(_) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_names_target_and_level() {
        let d = level_directive("rag_store", Level::DEBUG).unwrap();
        assert_eq!(d.to_string(), "rag_store=debug");
    }
}

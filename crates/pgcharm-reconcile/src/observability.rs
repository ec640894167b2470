//! Tracing setup for pgcharm invocations.
//!
//! Each process handles at most one host notification, so logs go to stderr
//! and every event carries the notification kind through [`invocation_span`].

use std::sync::OnceLock;

use pgcharm_core::NotificationKind;
use tracing::Span;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| filter_for(level));

    let (reload_layer, handle) = reload::Layer::new(filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

/// Switches the active level, keeping dependency noise out below `debug`.
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = filter_for(level);
        });
    }
}

/// Span wrapping one delivery: the fresh notification plus any replayed ones.
///
/// `kind` is `None` for a bare redelivery pass.
pub fn invocation_span(kind: Option<NotificationKind>) -> Span {
    match kind {
        Some(kind) => tracing::info_span!("pgcharm", notification = %kind),
        None => tracing::info_span!("pgcharm", notification = "redeliver"),
    }
}

/// Builds a filter for `level`. A bare level applies to the pgcharm crates;
/// anything with a directive syntax is used as given.
fn filter_for(level: &str) -> EnvFilter {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return EnvFilter::new(level);
    }
    EnvFilter::new(format!(
        "warn,pgcharm={level},pgcharm_core={level},pgcharm_config={level},\
         pgcharm_admin={level},pgcharm_reconcile={level}"
    ))
}

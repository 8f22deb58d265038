//! Telemetry initialization.
//!
//! Controlled by `VARY_LOG`:
//! - unset → no-op (tracing disabled, zero overhead)
//! - `"json"` → JSON spans/events to stderr
//! - anything else → compact fmt output to stderr, the value doubling as the
//!   filter directive (e.g. `VARY_LOG=vary=debug`)
//!
//! `RUST_LOG` refines the filter in both active modes.

use tracing_subscriber::EnvFilter;

/// Initialize tracing from the environment. Call once from `main`.
pub fn init() {
    let mode = std::env::var("VARY_LOG").ok();
    match mode.as_deref() {
        None | Some("") => {}
        Some("json") => init_json(),
        Some(filter) => init_fmt(filter),
    }
}

fn base_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn init_json() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    tracing_subscriber::registry()
        .with(base_filter("info"))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn init_fmt(filter: &str) {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    tracing_subscriber::registry()
        .with(base_filter(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

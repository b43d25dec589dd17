//! Logging setup for hosts that do not install their own subscriber.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a `tracing` subscriber writing to stderr.
///
/// `default_filter` is an `EnvFilter` directive such as
/// `"info,worldlink_transport=debug"`. `RUST_LOG` overrides it. Returns
/// `false` if a global subscriber was already set, in which case nothing
/// changes.
pub fn init_logging(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok()
}

//! Logging initialization.
//!
//! This module installs a `tracing_subscriber` formatter with an
//! [`EnvFilter`]. Targets and thread ids are printed with every event.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directive used when neither `RUST_LOG` nor the config provides one.
pub const DEFAULT_FILTER: &str = "info,vkpipe_rhi=debug,vkpipe_renderer=debug";

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `directive`; `directive` wins over [`DEFAULT_FILTER`].
/// Calling this twice is harmless: the second registration is ignored.
///
/// # Example
/// ```
/// vkpipe_core::init_logging(None);
/// tracing::info!("pipeline starting");
/// ```
pub fn init_logging(directive: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive.unwrap_or(DEFAULT_FILTER)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}

//! Tracing subscriber setup shared by the service binaries
//!
//! The subscriber is installed before the config file is read, so config
//! loading itself is logged. Its filter is swapped for `[logging].level`
//! once the config is known.

use crate::{Error, Result};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle to the installed filter
pub struct LogFilterHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilterHandle {
    /// Replace the bootstrap filter with `directive`
    ///
    /// No-op when `RUST_LOG` chose the filter.
    ///
    /// # Errors
    /// `Error::Internal` if the subscriber holding the filter is gone
    pub fn apply_level(&self, directive: &str) -> Result<()> {
        if self.from_env {
            return Ok(());
        }
        self.handle.reload(EnvFilter::new(directive)).map_err(|e| {
            Error::Internal(format!("Failed to apply log level {}: {}", directive, e))
        })
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `bootstrap_directive` is used until
/// `LogFilterHandle::apply_level` is called. Calling this twice is harmless:
/// the second install is ignored.
pub fn init_tracing(bootstrap_directive: &str) -> LogFilterHandle {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(bootstrap_directive), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    LogFilterHandle { handle, from_env }
}

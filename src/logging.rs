//! Tracing subscriber setup for binaries and tests.
//!
//! ```
//! mvindex::logging::init_logging("mvindex=info")?;
//! assert!(mvindex::logging::init_logging("mvindex=info").is_err());
//! # Ok::<(), mvindex::IndexError>(())
//! ```

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{IndexError, Result};

/// Installs a global `fmt` subscriber filtered by `filter`
/// (an `EnvFilter` directive such as `"mvindex=debug"`).
pub fn init_logging(filter: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(filter)
                .map_err(|e| IndexError::InvalidArgument(format!("invalid log filter: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| IndexError::InvalidArgument("logging already initialized".into()))
}

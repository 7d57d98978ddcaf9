//! This module provides observability and diagnostics capabilities for pipelines.
//!
//! Chunked execution is only trustworthy if the state hand-off between chunks can be
//! inspected. Atoms and sequences log through the `log` facade; this module installs
//! the `env_logger` backend and provides the `log_metric!` macro for structured
//! key/value events.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::sync::Once;

use crate::config::LoggingConfig;
use crate::error::{ComposeError, Result};

/// Logs a structured key-value metric line at `debug` level, only in debug builds.
///
/// # Example
/// ```
/// use atomflow::log_metric;
/// let chunk = 4;
/// log_metric!("event" = "apply", "atom" = "sosfilt", "chunk" = &chunk);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::__log::debug!("ATOMFLOW_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs the global logger according to `config`.
///
/// Only the first call has an effect; later calls return `Ok(())` without touching
/// the installed logger.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level: LevelFilter = config
        .level
        .parse()
        .map_err(|_| ComposeError::Config(format!("Unknown log level '{}'", config.level)))?;

    let file = match &config.file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

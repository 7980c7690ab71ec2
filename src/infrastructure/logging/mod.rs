// Logging module - Logging infrastructure
use crate::domain::error::{SerialMonError, SerialMonResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system.
///
/// `RUST_LOG` wins over `level`; `verbose` forces debug output for this crate.
/// Diagnostics go to stderr so they never interleave with monitor output on stdout.
pub fn init_logging(level: &str, verbose: bool) -> SerialMonResult<()> {
    let env_filter = if verbose {
        EnvFilter::new("serialmon=debug,warn")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(verbose)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()
        .map_err(|e| SerialMonError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("SerialMon logging system initialized");
    Ok(())
}

fn default_directive(level: &str) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        l @ ("error" | "warn" | "info" | "debug" | "trace" | "off") => l.to_string(),
        _ => "info".to_string(),
    };
    format!("serialmon={},warn", level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "serialmon=debug,warn");
        assert_eq!(default_directive("WARN"), "serialmon=warn,warn");
        assert_eq!(default_directive("loud"), "serialmon=info,warn");
    }

    #[test]
    fn test_logging_init_twice_reports_error() {
        // The first call may race with other tests; the second must not panic
        let _ = init_logging("info", false);
        assert!(init_logging("info", false).is_err());
    }
}

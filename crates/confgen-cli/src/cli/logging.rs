use super::CliError;
use anyhow::anyhow;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the stderr log layer. `RUST_LOG` takes precedence over the
/// command-line verbosity when it is set.
pub(super) fn setup_logging(verbosity: u8, quiet: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(verbosity, quiet)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|error| CliError::Internal(anyhow!("failed to install logger: {error}")))
}

fn level_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "off";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Settings;

/// Installs the global subscriber. Everything goes to stderr; stdout is the
/// response channel.
pub fn init(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&settings.log_filter)
        .with_context(|| format!("invalid GRADINGD_LOG filter: {}", settings.log_filter))?;
    let fmt = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

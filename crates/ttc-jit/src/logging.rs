use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let ansi = std::io::stderr().is_terminal();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(ansi);
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InitError::Subscriber(err.to_string()))
}

/// Like [`init_tracing`], but a second call is not an error.
pub fn ensure_tracing() -> Result<(), InitError> {
    match init_tracing() {
        Ok(()) | Err(InitError::AlreadyInitialised) => Ok(()),
        Err(err) => Err(err),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_already_initialised() {
        let _ = ensure_tracing();
        assert!(matches!(init_tracing(), Err(InitError::AlreadyInitialised)));
        assert!(ensure_tracing().is_ok());
    }
}

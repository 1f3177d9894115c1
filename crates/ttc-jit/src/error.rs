use std::io;

use thiserror::Error;

/// Errors raised while creating or executing a transpose plan.
///
/// Every creation-time variant aborts the plan being built; nothing is cached.
#[derive(Debug, Error)]
pub enum TtcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error(
        "resource exhausted while {context}: {source} (os error {code})",
        code = .source.raw_os_error().unwrap_or(0)
    )]
    ResourceExhaustion {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("external process failed: {0}")]
    ExternalProcessFailure(String),
    #[error("generator protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("build failed: {0}")]
    BuildFailure(String),
    #[error("symbol '{symbol}' not found in {artifact}: {reason}")]
    SymbolResolutionFailure {
        symbol: String,
        artifact: String,
        reason: String,
    },
    #[error("kernel returned status {code}")]
    KernelFailure { code: i32 },
}

pub type TtcResult<T> = Result<T, TtcError>;

impl TtcError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TtcError::InvalidArgument(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        TtcError::UnsupportedConfiguration(message.into())
    }

    pub fn process(message: impl Into<String>) -> Self {
        TtcError::ExternalProcessFailure(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        TtcError::ProtocolViolation(message.into())
    }

    pub fn build(message: impl Into<String>) -> Self {
        TtcError::BuildFailure(message.into())
    }

    pub(crate) fn resource(context: impl Into<String>, source: io::Error) -> Self {
        TtcError::ResourceExhaustion {
            context: context.into(),
            source,
        }
    }

    /// Stable short name of the variant, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TtcError::InvalidArgument(_) => "invalid_argument",
            TtcError::UnsupportedConfiguration(_) => "unsupported_configuration",
            TtcError::ResourceExhaustion { .. } => "resource_exhaustion",
            TtcError::ExternalProcessFailure(_) => "external_process_failure",
            TtcError::ProtocolViolation(_) => "protocol_violation",
            TtcError::BuildFailure(_) => "build_failure",
            TtcError::SymbolResolutionFailure { .. } => "symbol_resolution_failure",
            TtcError::KernelFailure { .. } => "kernel_failure",
        }
    }
}

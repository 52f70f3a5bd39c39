//! Error types for the Lua sandbox.

use thiserror::Error;

use crate::sandbox::quota::QuotaHit;

/// Errors that can occur during sandbox execution.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The source failed to parse. No execution was attempted.
    #[error("compile error: {0}")]
    Compile(String),

    /// The sandboxed code raised an error. The original message is preserved.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Execution was aborted after exceeding the instruction quota.
    #[error("quota exceeded: {limit} instructions")]
    QuotaExceeded {
        /// The instruction budget that was exhausted.
        limit: u64,
    },

    /// An instruction quota was requested on a runtime without count hooks.
    #[error("instruction quotas are not supported by this Lua runtime")]
    QuotaUnsupported,

    /// The input was recognized as a precompiled chunk and rejected.
    #[error("binary chunk rejected: only text source is accepted")]
    BinaryInputRejected,

    /// The engine memory limit was exceeded.
    #[error("memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),

    /// Failed to initialize the Lua engine or wire up the sandbox.
    #[error("failed to initialize runtime: {0}")]
    RuntimeInit(#[source] anyhow::Error),
}

impl SandboxError {
    /// Check if this error represents a compile failure.
    pub fn is_compile(&self) -> bool {
        matches!(self, SandboxError::Compile(_))
    }

    /// Check if this error represents a runtime error raised by the script.
    pub fn is_runtime(&self) -> bool {
        matches!(self, SandboxError::Runtime(_))
    }

    /// Check if this error represents an exhausted instruction quota.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, SandboxError::QuotaExceeded { .. })
    }

    /// Check if this error represents a rejected precompiled chunk.
    pub fn is_binary_rejected(&self) -> bool {
        matches!(self, SandboxError::BinaryInputRejected)
    }

    /// Check if this error represents an exceeded memory limit.
    pub fn is_memory_limit(&self) -> bool {
        matches!(self, SandboxError::MemoryLimitExceeded(_))
    }

    /// Classify an error reported by the interpreter.
    ///
    /// Quota aborts travel through the interpreter as an external error raised
    /// from the instruction hook; they are unwrapped here so callers see a
    /// distinct cause instead of a generic runtime failure.
    pub(crate) fn from_lua(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => SandboxError::Compile(message),
            mlua::Error::MemoryError(message) => SandboxError::MemoryLimitExceeded(message),
            mlua::Error::CallbackError { cause, .. } => Self::from_lua((*cause).clone()),
            mlua::Error::ExternalError(cause) => match cause.downcast_ref::<QuotaHit>() {
                Some(hit) => SandboxError::QuotaExceeded { limit: hit.0 },
                None => SandboxError::Runtime(cause.to_string()),
            },
            mlua::Error::RuntimeError(message) => SandboxError::Runtime(message),
            other => SandboxError::Runtime(other.to_string()),
        }
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

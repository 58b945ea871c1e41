//! Shared runtime error type for backend implementations.
//!
//! Configuration errors are fatal at the point of use. Shape, compilation and
//! execution errors are recoverable: the caller may retry with corrected
//! inputs.

use crate::ir::verify::IrVerifyError;

/// The five failure categories every backend reports through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ShapeMismatch,
    Compilation,
    Execution,
    UnmaterializedData,
}

/// Structured runtime error for backend implementations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The registry was queried before any backend was installed.
    #[error("no backend registered")]
    NoBackend,
    /// A second backend registration was attempted.
    #[error("backend already registered: {active} (rejected {rejected})")]
    AlreadyRegistered { active: String, rejected: String },
    /// Invalid device kind, device string, or device not owned by the backend.
    #[error("configuration error: {message}")]
    Configuration { message: String },
    /// Data transfer or argument binding with incompatible shape or type.
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },
    /// Malformed or unsupported graph handed to lowering or compile.
    #[error("compilation error: {message}")]
    Compilation { message: String },
    /// The node sequence handed to a lowering context is not a valid post-order.
    #[error("compilation error: {0}")]
    IrVerify(#[from] IrVerifyError),
    /// Wrong arguments at execute time, or a backend-internal failure.
    #[error("execution error: {message}")]
    Execution { message: String },
    /// A placeholder handle was read before its producing execution.
    #[error("data for {shape} on {device} has not been materialized")]
    UnmaterializedData { shape: String, device: String },
}

impl RuntimeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RuntimeError::Configuration { message: message.into() }
    }

    pub fn shape_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        RuntimeError::ShapeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn compilation(message: impl Into<String>) -> Self {
        RuntimeError::Compilation { message: message.into() }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        RuntimeError::Execution { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::NoBackend
            | RuntimeError::AlreadyRegistered { .. }
            | RuntimeError::Configuration { .. } => ErrorKind::Configuration,
            RuntimeError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            RuntimeError::Compilation { .. } | RuntimeError::IrVerify(_) => ErrorKind::Compilation,
            RuntimeError::Execution { .. } => ErrorKind::Execution,
            RuntimeError::UnmaterializedData { .. } => ErrorKind::UnmaterializedData,
        }
    }

    /// Configuration errors abort the calling operation; everything else is
    /// reported to the caller as a recoverable failure.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

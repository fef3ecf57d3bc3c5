use crate::value::{Kind, KindSet};
use thiserror::Error;

pub type Result<T> = core::result::Result<T, RuntimeError>;

/// The full error taxonomy raised by the parser, compiler, and runtime.
///
/// Every public fallible operation in this crate returns `Result<T>` built
/// on this type; nothing in the core panics on user-reachable input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("parse error at {location}: {message}")]
    Parse { location: String, message: String },

    #[error("type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: KindSet, got: Kind },

    #[error("unknown name: {0}")]
    UnknownName(String),

    #[error("duplicate name: {0}")]
    Duplicate(String),

    #[error("module '{module}' has no method '{method}'")]
    UnknownMethod { module: String, method: String },

    #[error("module '{module}' has no property '{property}'")]
    UnknownProperty { module: String, property: String },

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("routine '{0}' is already running")]
    AlreadyRunning(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("checksum mismatch on line")]
    ChecksumMismatch,

    #[error("malformed control line: {0}")]
    MalformedControl(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Io(e.to_string())
    }
}

impl RuntimeError {
    pub fn type_mismatch(expected: KindSet, got: Kind) -> RuntimeError {
        RuntimeError::TypeMismatch { expected, got }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of every fault a transport can surface to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCode {
    NotFound,
    Unauthorized,
    TransportDisabled,
    CoercionFailed,
    InvocationFailed,
    Internal,
}

impl FaultCode {
    /// HTTP-style status used by both transports.
    pub fn status_code(&self) -> u16 {
        match self {
            FaultCode::NotFound => 404,
            FaultCode::Unauthorized => 401,
            FaultCode::TransportDisabled => 403,
            FaultCode::CoercionFailed | FaultCode::InvocationFailed | FaultCode::Internal => 500,
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultCode::NotFound => "not_found",
            FaultCode::Unauthorized => "unauthorized",
            FaultCode::TransportDisabled => "transport_disabled",
            FaultCode::CoercionFailed => "coercion_failed",
            FaultCode::InvocationFailed => "invocation_failed",
            FaultCode::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// A recoverable failure reported back through a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct Fault {
    pub code: FaultCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Fault {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FaultCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Unauthorized, message)
    }

    pub fn transport_disabled(message: impl Into<String>) -> Self {
        Self::new(FaultCode::TransportDisabled, message)
    }

    pub fn coercion_failed(message: impl Into<String>) -> Self {
        Self::new(FaultCode::CoercionFailed, message)
    }

    pub fn invocation_failed(message: impl Into<String>) -> Self {
        Self::new(FaultCode::InvocationFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Internal, message)
    }

    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

/// Failure raised by a service operation itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Failed(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field is read-only: {0}")]
    ReadOnlyField(String),

    #[error("Invalid argument {index}: {message}")]
    InvalidArgument { index: usize, message: String },
}

impl ServiceError {
    pub fn failed(message: impl Into<String>) -> Self {
        ServiceError::Failed(message.into())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Failed(format!("JSON error: {}", err))
    }
}

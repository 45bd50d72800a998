use serde_json::Value;
use thiserror::Error;

use crate::error_codes::{self, ErrorCategory};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Failed to reach software server: {0}")]
    ConnectionFailed(#[from] std::io::Error),

    #[error("Failed to encode remote call: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Remote error ({code}): {message}")]
    Rpc {
        code: i32,
        message: String,
        context: Option<Value>,
    },

    #[error("Remote handle is not connected")]
    NotConnected,

    #[error("Invalid response from software server")]
    InvalidResponse,
}

impl RemoteError {
    pub fn rpc(code: i32, message: impl Into<String>) -> Self {
        RemoteError::Rpc {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Returns the JSON-RPC error code, or `GENERIC_ERROR` for transport failures.
    pub fn code(&self) -> i32 {
        match self {
            RemoteError::Rpc { code, .. } => *code,
            _ => error_codes::GENERIC_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RemoteError::Rpc { code, .. } => error_codes::category_for_code(*code),
            RemoteError::ConnectionFailed(_) | RemoteError::NotConnected => {
                ErrorCategory::External
            }
            RemoteError::SerializationFailed(_) | RemoteError::InvalidResponse => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Rpc { code, .. } if *code == error_codes::OBJECT_NOT_FOUND)
    }

    pub fn context(&self) -> Option<&Value> {
        match self {
            RemoteError::Rpc { context, .. } => context.as_ref(),
            _ => None,
        }
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            RemoteError::ConnectionFailed(_) | RemoteError::NotConnected => {
                Some("Check that the software server is running and TIA_ADDR points at it.")
            }
            RemoteError::Rpc { code, .. } if *code == error_codes::OBJECT_NOT_FOUND => {
                Some("The object may have been closed in TIA. Run 'tree' to resynchronize.")
            }
            RemoteError::Rpc { code, .. } if *code == error_codes::INVALID_MODE => {
                Some("Select a setup in the required scan mode first.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = RemoteError::rpc(error_codes::OBJECT_NOT_FOUND, "No window named 'W'");
        assert_eq!(err.to_string(), "Remote error (-32001): No window named 'W'");
    }

    #[test]
    fn test_rpc_error_category_and_not_found() {
        let err = RemoteError::rpc(error_codes::OBJECT_NOT_FOUND, "gone");
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.is_not_found());
        assert!(err.suggestion().is_some());

        let err = RemoteError::rpc(error_codes::INVALID_MODE, "not spot mode");
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_transport_errors_use_generic_code() {
        let err = RemoteError::NotConnected;
        assert_eq!(err.code(), error_codes::GENERIC_ERROR);
        assert_eq!(err.category(), ErrorCategory::External);
        assert_eq!(RemoteError::InvalidResponse.category(), ErrorCategory::Internal);
    }
}

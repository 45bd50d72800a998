//! Errors raised by the mirrored session.
//!
//! Every error maps to a JSON-RPC style code and an [`ErrorCategory`] so the
//! control binary can report it uniformly.

use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tia_ipc::RemoteError;
use tia_ipc::error_codes::{self, ErrorCategory};

#[derive(Error, Debug)]
pub enum TiaError {
    #[error("Remote call '{operation}' failed: {source}")]
    RemoteCall {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("No {kind} named '{name}'")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid value '{value}' for {field}")]
    InvalidEnumValue { field: &'static str, value: String },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Setup not found: {0}")]
    SetupNotFound(String),

    #[error("'{operation}' is not allowed in the current mode: {message}")]
    InvalidMode {
        operation: &'static str,
        message: String,
    },

    #[error("Malformed record from '{operation}': {reason}")]
    MalformedRecord {
        operation: &'static str,
        reason: String,
    },

    #[error("Calibration '{name}' has a zero pixel delta")]
    DegenerateCalibration { name: String },
}

pub type Result<T> = std::result::Result<T, TiaError>;

impl TiaError {
    pub fn remote(operation: &'static str, source: RemoteError) -> Self {
        TiaError::RemoteCall { operation, source }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        TiaError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn malformed(operation: &'static str, reason: impl ToString) -> Self {
        TiaError::MalformedRecord {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            TiaError::RemoteCall { source, .. } => source.code(),
            TiaError::NotFound { .. } => error_codes::OBJECT_NOT_FOUND,
            TiaError::InvalidEnumValue { .. } => error_codes::INVALID_PARAMS,
            TiaError::OutOfRange { .. } => error_codes::OUT_OF_RANGE,
            TiaError::SetupNotFound(_) => error_codes::SETUP_NOT_FOUND,
            TiaError::InvalidMode { .. } => error_codes::INVALID_MODE,
            TiaError::MalformedRecord { .. } => error_codes::MALFORMED_RECORD,
            TiaError::DegenerateCalibration { .. } => error_codes::DEGENERATE_CALIBRATION,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            TiaError::RemoteCall { source, .. } => source.category(),
            _ => error_codes::category_for_code(self.code()),
        }
    }

    /// True when the remote reported that the addressed object no longer exists.
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, TiaError::RemoteCall { source, .. } if source.is_not_found())
    }

    pub fn context(&self) -> Value {
        match self {
            TiaError::RemoteCall { operation, source } => json!({
                "operation": operation,
                "remote_code": source.code(),
                "remote_context": source.context(),
            }),
            TiaError::NotFound { kind, name } => json!({ "kind": kind, "name": name }),
            TiaError::InvalidEnumValue { field, value } => {
                json!({ "field": field, "value": value })
            }
            TiaError::OutOfRange {
                field,
                value,
                min,
                max,
            } => json!({ "field": field, "value": value, "min": min, "max": max }),
            TiaError::SetupNotFound(name) => json!({ "setup": name }),
            TiaError::InvalidMode { operation, message } => {
                json!({ "operation": operation, "message": message })
            }
            TiaError::MalformedRecord { operation, reason } => {
                json!({ "operation": operation, "reason": reason })
            }
            TiaError::DegenerateCalibration { name } => json!({ "calibration": name }),
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            TiaError::RemoteCall { source, .. } => source.suggestion().map(str::to_string),
            TiaError::NotFound { .. } => {
                Some("Run 'tree' or 'var list' to see what the session contains.".to_string())
            }
            TiaError::SetupNotFound(_) => {
                Some("Create it with 'setup add <name>' or pick an existing setup.".to_string())
            }
            TiaError::InvalidMode { .. } => {
                Some("Select a setup whose scan mode matches the operation.".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_call_uses_remote_code_and_category() {
        let err = TiaError::remote(
            "CloseDisplayWindow",
            RemoteError::rpc(error_codes::OBJECT_NOT_FOUND, "gone"),
        );
        assert_eq!(err.code(), error_codes::OBJECT_NOT_FOUND);
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.is_remote_not_found());
    }

    #[test]
    fn test_local_not_found_is_not_remote_not_found() {
        let err = TiaError::not_found("window", "W");
        assert_eq!(err.to_string(), "No window named 'W'");
        assert!(!err.is_remote_not_found());
        assert_eq!(err.context()["name"], "W");
    }

    #[test]
    fn test_out_of_range_display_and_category() {
        let err = TiaError::OutOfRange {
            field: "x",
            value: 1.5,
            min: -1.0,
            max: 1.0,
        };
        assert_eq!(err.to_string(), "x = 1.5 is outside [-1, 1]");
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    #[test]
    fn test_setup_not_found_has_suggestion() {
        let err = TiaError::SetupNotFound("Spot".to_string());
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.suggestion().is_some());
    }
}

//! Semantic error codes reported by the software server.
//!
//! Codes follow the JSON-RPC 2.0 layout:
//! - -32700 to -32600: reserved protocol errors
//! - -32000 to -32099: server errors (-32001 to -32009 are instrument-session errors)

// Protocol errors
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

// Object lookups
pub const OBJECT_NOT_FOUND: i32 = -32001;
pub const SETUP_NOT_FOUND: i32 = -32002;

// Rejected operations
pub const REMOTE_REJECTED: i32 = -32003;
pub const INVALID_MODE: i32 = -32004;
pub const VARIABLE_TYPE_CONFLICT: i32 = -32005;
pub const OUT_OF_RANGE: i32 = -32006;
pub const RESOURCE_LIMIT: i32 = -32007;

// Client-side decoding and geometry failures
pub const MALFORMED_RECORD: i32 = -32008;
pub const DEGENERATE_CALIBRATION: i32 = -32009;

// Legacy generic error reported by older servers
pub const GENERIC_ERROR: i32 = -32000;

/// Error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote object or setup does not exist
    NotFound,
    /// Request violated a precondition (mode, range, type)
    InvalidInput,
    /// Remote ran out of a resource
    Busy,
    /// Protocol or decoding failure
    Internal,
    /// Transport or instrument failure
    External,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Busy => "busy",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
        }
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_found" => Ok(ErrorCategory::NotFound),
            "invalid_input" => Ok(ErrorCategory::InvalidInput),
            "busy" => Ok(ErrorCategory::Busy),
            "internal" => Ok(ErrorCategory::Internal),
            "external" => Ok(ErrorCategory::External),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns the error category for a given error code.
pub fn category_for_code(code: i32) -> ErrorCategory {
    match code {
        OBJECT_NOT_FOUND | SETUP_NOT_FOUND => ErrorCategory::NotFound,
        INVALID_MODE | VARIABLE_TYPE_CONFLICT | OUT_OF_RANGE | INVALID_PARAMS
        | DEGENERATE_CALIBRATION => ErrorCategory::InvalidInput,
        RESOURCE_LIMIT => ErrorCategory::Busy,
        REMOTE_REJECTED | GENERIC_ERROR => ErrorCategory::External,
        _ => ErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_for_not_found_codes() {
        assert_eq!(category_for_code(OBJECT_NOT_FOUND), ErrorCategory::NotFound);
        assert_eq!(category_for_code(SETUP_NOT_FOUND), ErrorCategory::NotFound);
    }

    #[test]
    fn test_category_for_precondition_codes() {
        assert_eq!(category_for_code(INVALID_MODE), ErrorCategory::InvalidInput);
        assert_eq!(
            category_for_code(VARIABLE_TYPE_CONFLICT),
            ErrorCategory::InvalidInput
        );
        assert_eq!(category_for_code(OUT_OF_RANGE), ErrorCategory::InvalidInput);
    }

    #[test]
    fn test_category_for_unknown_code_is_internal() {
        assert_eq!(category_for_code(METHOD_NOT_FOUND), ErrorCategory::Internal);
        assert_eq!(category_for_code(-1), ErrorCategory::Internal);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in [
            ErrorCategory::NotFound,
            ErrorCategory::InvalidInput,
            ErrorCategory::Busy,
            ErrorCategory::Internal,
            ErrorCategory::External,
        ] {
            assert_eq!(category.as_str().parse::<ErrorCategory>(), Ok(category));
        }
        assert!("bogus".parse::<ErrorCategory>().is_err());
    }
}

//! Enumerated server fields and their remote integer codes.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, TiaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcquireMode {
    Continuous,
    Single,
}

impl AcquireMode {
    pub fn code(self) -> i64 {
        match self {
            AcquireMode::Continuous => 0,
            AcquireMode::Single => 1,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(AcquireMode::Continuous),
            1 => Ok(AcquireMode::Single),
            other => Err(TiaError::InvalidEnumValue {
                field: "acquire_mode",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AcquireMode::Continuous => "Continuous",
            AcquireMode::Single => "Single",
        }
    }
}

impl FromStr for AcquireMode {
    type Err = TiaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Continuous" => Ok(AcquireMode::Continuous),
            "Single" => Ok(AcquireMode::Single),
            other => Err(TiaError::InvalidEnumValue {
                field: "acquire_mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AcquireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanMode {
    Spot,
    Line,
    Frame,
}

impl ScanMode {
    pub fn code(self) -> i64 {
        match self {
            ScanMode::Spot => 0,
            ScanMode::Line => 1,
            ScanMode::Frame => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(ScanMode::Spot),
            1 => Ok(ScanMode::Line),
            2 => Ok(ScanMode::Frame),
            other => Err(TiaError::InvalidEnumValue {
                field: "scan_mode",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Spot => "Spot",
            ScanMode::Line => "Line",
            ScanMode::Frame => "Frame",
        }
    }
}

impl FromStr for ScanMode {
    type Err = TiaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Spot" => Ok(ScanMode::Spot),
            "Line" => Ok(ScanMode::Line),
            "Frame" => Ok(ScanMode::Frame),
            other => Err(TiaError::InvalidEnumValue {
                field: "scan_mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Microscope mode used to list magnification calibrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnificationMode {
    Imaging,
    Diffraction,
}

impl MagnificationMode {
    pub fn code(self) -> i64 {
        match self {
            MagnificationMode::Imaging => 0,
            MagnificationMode::Diffraction => 1,
        }
    }
}

/// Signal families the acquisition manager can enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Detectors,
    Ccds,
}

impl SignalType {
    pub fn code(self) -> i64 {
        match self {
            SignalType::Detectors => 0,
            SignalType::Ccds => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_mode_codes() {
        assert_eq!(AcquireMode::Continuous.code(), 0);
        assert_eq!(AcquireMode::from_code(1).unwrap(), AcquireMode::Single);
        assert!(AcquireMode::from_code(2).is_err());
    }

    #[test]
    fn test_acquire_mode_parse() {
        assert_eq!("Single".parse::<AcquireMode>().unwrap(), AcquireMode::Single);
        let err = "Burst".parse::<AcquireMode>().unwrap_err();
        assert!(matches!(
            err,
            TiaError::InvalidEnumValue { field: "acquire_mode", ref value } if value == "Burst"
        ));
    }

    #[test]
    fn test_scan_mode_codes_and_parse() {
        for mode in [ScanMode::Spot, ScanMode::Line, ScanMode::Frame] {
            assert_eq!(ScanMode::from_code(mode.code()).unwrap(), mode);
            assert_eq!(mode.as_str().parse::<ScanMode>().unwrap(), mode);
        }
        assert!(ScanMode::from_code(3).is_err());
        assert!("spot".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_signal_type_codes() {
        assert_eq!(SignalType::Detectors.code(), 0);
        assert_eq!(SignalType::Ccds.code(), 6);
        assert_eq!(MagnificationMode::Diffraction.code(), 1);
    }
}

//! Plain value objects mirroring remote data records.
//!
//! These carry no remote identity. Objects that do own a remote name
//! (position collections, spatial units) live in [`crate::workspace`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, TiaError};

/// A point in either physical units or normalized `[-1, 1]` coordinates,
/// depending on the owning server's position-calibrated flag.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl Position2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (-1.0..=1.0).contains(&self.x) && (-1.0..=1.0).contains(&self.y)
    }
}

impl From<[f64; 2]> for Position2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Calibration2D {
    pub offset_x: f64,
    pub offset_y: f64,
    /// Physical units per pixel along X.
    pub delta_x: f64,
    /// Physical units per pixel along Y.
    pub delta_y: f64,
    pub cal_index_x: i32,
    pub cal_index_y: i32,
}

impl Calibration2D {
    pub fn new(offset_x: f64, offset_y: f64, delta_x: f64, delta_y: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            delta_x,
            delta_y,
            cal_index_x: 0,
            cal_index_y: 0,
        }
    }

    pub fn with_cal_indices(mut self, x: i32, y: i32) -> Self {
        self.cal_index_x = x;
        self.cal_index_y = y;
        self
    }

    /// Fails when either delta is zero; pixel coordinates divide by them.
    pub fn ensure_bindable(&self, name: &str) -> Result<()> {
        if self.delta_x == 0.0 || self.delta_y == 0.0 {
            return Err(TiaError::DegenerateCalibration {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn ensure_ordered(field: &'static str, start: f64, end: f64) -> Result<()> {
    if end < start {
        return Err(TiaError::OutOfRange {
            field,
            value: end,
            min: start,
            max: f64::INFINITY,
        });
    }
    Ok(())
}

/// One-dimensional range. Size and center are derived and never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range1D {
    start: f64,
    end: f64,
    size: f64,
    center: f64,
}

impl Range1D {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        ensure_ordered("end", start, end)?;
        Ok(Self {
            start,
            end,
            size: end - start,
            center: (start + end) / 2.0,
        })
    }

    /// Builds a range from a remote record, keeping the remote's derived fields.
    pub fn from_remote(start: f64, end: f64, size: f64, center: f64) -> Self {
        Self {
            start,
            end,
            size,
            center,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.start..=self.end).contains(&value)
    }

    /// Returns a new range with the given bounds and re-derived size and center.
    pub fn with_bounds(&self, start: f64, end: f64) -> Result<Self> {
        Self::new(start, end)
    }
}

impl fmt::Display for Range1D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Two-dimensional range. Size and center are derived and never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range2D {
    start: Position2D,
    end: Position2D,
    size_x: f64,
    size_y: f64,
    center: Position2D,
}

impl Range2D {
    pub fn new(start: Position2D, end: Position2D) -> Result<Self> {
        ensure_ordered("end_x", start.x, end.x)?;
        ensure_ordered("end_y", start.y, end.y)?;
        Ok(Self {
            start,
            end,
            size_x: end.x - start.x,
            size_y: end.y - start.y,
            center: Position2D::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0),
        })
    }

    /// Builds a range from a remote record, keeping the remote's derived fields.
    pub fn from_remote(
        start: Position2D,
        end: Position2D,
        size_x: f64,
        size_y: f64,
        center: Position2D,
    ) -> Self {
        Self {
            start,
            end,
            size_x,
            size_y,
            center,
        }
    }

    pub fn start(&self) -> Position2D {
        self.start
    }

    pub fn end(&self) -> Position2D {
        self.end
    }

    pub fn size(&self) -> (f64, f64) {
        (self.size_x, self.size_y)
    }

    pub fn center(&self) -> Position2D {
        self.center
    }

    pub fn with_start(&self, start: Position2D) -> Result<Self> {
        Self::new(start, self.end)
    }

    pub fn with_end(&self, end: Position2D) -> Result<Self> {
        Self::new(self.start, end)
    }

    pub fn is_normalized(&self) -> bool {
        self.start.is_normalized() && self.end.is_normalized()
    }
}

impl fmt::Display for Range2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// Unit vocabulary accepted by the remote for spatial units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "um")]
    Micrometer,
    #[serde(rename = "nm")]
    Nanometer,
    #[serde(rename = "A")]
    Angstrom,
    #[serde(rename = "1/m")]
    InverseMeter,
    #[serde(rename = "1/mm")]
    InverseMillimeter,
    #[serde(rename = "1/um")]
    InverseMicrometer,
    #[serde(rename = "1/nm")]
    InverseNanometer,
    #[serde(rename = "1/A")]
    InverseAngstrom,
}

impl Unit {
    pub const ALL: [Unit; 10] = [
        Unit::Meter,
        Unit::Millimeter,
        Unit::Micrometer,
        Unit::Nanometer,
        Unit::Angstrom,
        Unit::InverseMeter,
        Unit::InverseMillimeter,
        Unit::InverseMicrometer,
        Unit::InverseNanometer,
        Unit::InverseAngstrom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Meter => "m",
            Unit::Millimeter => "mm",
            Unit::Micrometer => "um",
            Unit::Nanometer => "nm",
            Unit::Angstrom => "A",
            Unit::InverseMeter => "1/m",
            Unit::InverseMillimeter => "1/mm",
            Unit::InverseMicrometer => "1/um",
            Unit::InverseNanometer => "1/nm",
            Unit::InverseAngstrom => "1/A",
        }
    }

    pub fn is_reciprocal(&self) -> bool {
        self.as_str().starts_with("1/")
    }
}

impl FromStr for Unit {
    type Err = TiaError;

    fn from_str(s: &str) -> Result<Self> {
        Unit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| TiaError::InvalidEnumValue {
                field: "unit",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Named workspace variables and their tagged decode.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, TiaError};
use crate::ports::RemoteRef;
use crate::values::{Calibration2D, Position2D, Range1D, Range2D, Unit};

/// Type tag the remote reports for a workspace variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Calibration2D,
    Range2D,
    Range1D,
    Position2D,
    PositionCollection,
    SpatialUnit,
    Unknown(String),
}

impl ValueKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Calibration2D" => ValueKind::Calibration2D,
            "Range2D" => ValueKind::Range2D,
            "Range1D" => ValueKind::Range1D,
            "Position2D" => ValueKind::Position2D,
            "PositionCollection" => ValueKind::PositionCollection,
            "SpatialUnit" => ValueKind::SpatialUnit,
            other => ValueKind::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            ValueKind::Calibration2D => "Calibration2D",
            ValueKind::Range2D => "Range2D",
            ValueKind::Range1D => "Range1D",
            ValueKind::Position2D => "Position2D",
            ValueKind::PositionCollection => "PositionCollection",
            ValueKind::SpatialUnit => "SpatialUnit",
            ValueKind::Unknown(tag) => tag,
        }
    }
}

/// An ordered set of beam positions bound to a remote collection variable.
pub struct PositionCollection {
    name: String,
    remote: RemoteRef,
    positions: Vec<Position2D>,
}

impl fmt::Debug for PositionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionCollection")
            .field("name", &self.name)
            .field("positions", &self.positions)
            .finish()
    }
}

impl PositionCollection {
    pub fn create(remote: RemoteRef, name: &str) -> Result<Self> {
        remote.create_position_collection(name)?;
        Self::load(remote, name)
    }

    pub fn load(remote: RemoteRef, name: &str) -> Result<Self> {
        let positions = remote.read_position_collection(name)?;
        Ok(Self {
            name: name.to_string(),
            remote,
            positions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn positions(&self) -> &[Position2D] {
        &self.positions
    }

    pub fn count(&self) -> usize {
        self.positions.len()
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.positions = self.remote.read_position_collection(&self.name)?;
        Ok(())
    }

    pub fn add_position(&mut self, position: Position2D) -> Result<()> {
        self.remote.add_position(&self.name, position)?;
        self.positions.push(position);
        Ok(())
    }

    /// Replaces the collection with `count` points from `from` to `to`.
    pub fn set_line_pattern(&mut self, from: Position2D, to: Position2D, count: u32) -> Result<()> {
        self.remote.set_line_pattern(&self.name, from, to, count)?;
        self.refresh()
    }

    /// Replaces the collection with an `n_x` by `n_y` grid over the named range.
    pub fn set_grid_pattern(&mut self, range: &str, n_x: u32, n_y: u32) -> Result<()> {
        self.remote.set_grid_pattern(&self.name, range, n_x, n_y)?;
        self.refresh()
    }

    /// Copies positions `start..=stop` into a new remote collection.
    pub fn sub_collection(&self, varname: &str, start: usize, stop: usize) -> Result<Self> {
        if start > stop || stop >= self.positions.len() {
            return Err(TiaError::OutOfRange {
                field: "stop",
                value: stop as f64,
                min: start as f64,
                max: self.positions.len().saturating_sub(1) as f64,
            });
        }
        self.remote
            .select_positions(varname, &self.name, start, stop)?;
        Self::load(self.remote.clone(), varname)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.remote.remove_all_positions(&self.name)?;
        self.positions.clear();
        Ok(())
    }
}

/// A unit string bound to a remote variable. There is no setter.
pub struct SpatialUnit {
    name: String,
    remote: RemoteRef,
    unit: Unit,
}

impl fmt::Debug for SpatialUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialUnit")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .finish()
    }
}

impl SpatialUnit {
    pub fn create(remote: RemoteRef, name: &str, unit: &str) -> Result<Self> {
        let unit: Unit = unit.parse()?;
        remote.create_spatial_unit(name, unit.as_str())?;
        Self::load(remote, name)
    }

    pub fn load(remote: RemoteRef, name: &str) -> Result<Self> {
        let unit = remote.read_spatial_unit(name)?.parse()?;
        Ok(Self {
            name: name.to_string(),
            remote,
            unit,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-reads the unit from the remote.
    pub fn unit(&mut self) -> Result<Unit> {
        self.unit = self.remote.read_spatial_unit(&self.name)?.parse()?;
        Ok(self.unit)
    }

    pub fn last_unit(&self) -> Unit {
        self.unit
    }
}

/// A workspace variable mirrored locally.
#[derive(Debug)]
pub enum ValueObject {
    Calibration2D(Calibration2D),
    Range2D(Range2D),
    Range1D(Range1D),
    Position2D(Position2D),
    PositionCollection(PositionCollection),
    SpatialUnit(SpatialUnit),
}

impl ValueObject {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueObject::Calibration2D(_) => ValueKind::Calibration2D,
            ValueObject::Range2D(_) => ValueKind::Range2D,
            ValueObject::Range1D(_) => ValueKind::Range1D,
            ValueObject::Position2D(_) => ValueKind::Position2D,
            ValueObject::PositionCollection(_) => ValueKind::PositionCollection,
            ValueObject::SpatialUnit(_) => ValueKind::SpatialUnit,
        }
    }

    /// Reads a variable by tag. Unknown tags decode to `None`.
    pub fn decode(remote: &RemoteRef, varname: &str, kind: &ValueKind) -> Result<Option<Self>> {
        let value = match kind {
            ValueKind::Calibration2D => {
                ValueObject::Calibration2D(remote.read_calibration2d(varname)?)
            }
            ValueKind::Range2D => ValueObject::Range2D(remote.read_range2d(varname)?),
            ValueKind::Range1D => ValueObject::Range1D(remote.read_range1d(varname)?),
            ValueKind::Position2D => ValueObject::Position2D(remote.read_position2d(varname)?),
            ValueKind::PositionCollection => {
                ValueObject::PositionCollection(PositionCollection::load(remote.clone(), varname)?)
            }
            ValueKind::SpatialUnit => {
                ValueObject::SpatialUnit(SpatialUnit::load(remote.clone(), varname)?)
            }
            ValueKind::Unknown(tag) => {
                warn!(varname, tag = %tag, "Skipping workspace variable of unknown type");
                return Ok(None);
            }
        };
        debug!(varname, kind = kind.tag(), "Decoded workspace variable");
        Ok(Some(value))
    }

    pub fn summary(&self) -> VariableSummary {
        match self {
            ValueObject::Calibration2D(c) => VariableSummary::Calibration2D(*c),
            ValueObject::Range2D(r) => VariableSummary::Range2D(*r),
            ValueObject::Range1D(r) => VariableSummary::Range1D(*r),
            ValueObject::Position2D(p) => VariableSummary::Position2D(*p),
            ValueObject::PositionCollection(c) => {
                VariableSummary::PositionCollection(c.positions().to_vec())
            }
            ValueObject::SpatialUnit(u) => VariableSummary::SpatialUnit(u.last_unit()),
        }
    }
}

/// Serializable snapshot of a [`ValueObject`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum VariableSummary {
    Calibration2D(Calibration2D),
    Range2D(Range2D),
    Range1D(Range1D),
    Position2D(Position2D),
    PositionCollection(Vec<Position2D>),
    SpatialUnit(Unit),
}

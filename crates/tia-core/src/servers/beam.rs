use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TiaError};
use crate::modes::AcquireMode;
use crate::ports::{PropertyValue, RemoteRef};
use crate::values::{Position2D, Range2D};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeamState {
    pub dwell_time: f64,
    /// Positions are physical units when true, fractions of the maximum
    /// scan range in `[-1, 1]` when false.
    pub position_calibrated: bool,
}

/// Direct beam positioning. The scan mode is tracked locally because the
/// remote offers setters for it but no getter.
pub struct BeamControlProxy {
    remote: RemoteRef,
    state: BeamState,
    scan_mode: AcquireMode,
}

fn ensure_normalized(field: &'static str, value: f64) -> Result<()> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(TiaError::OutOfRange {
            field,
            value,
            min: -1.0,
            max: 1.0,
        });
    }
    Ok(())
}

impl BeamControlProxy {
    /// Attaches to the beam control and switches it to single scan.
    pub fn create(remote: RemoteRef) -> Result<Self> {
        remote.set_single_scan()?;
        let state = remote.beam_control()?;
        Ok(Self {
            remote,
            state,
            scan_mode: AcquireMode::Single,
        })
    }

    pub fn refresh(&mut self) -> Result<&BeamState> {
        self.state = self.remote.beam_control()?;
        Ok(&self.state)
    }

    pub fn state(&self) -> &BeamState {
        &self.state
    }

    fn write(&mut self, property: &str, value: PropertyValue) -> Result<()> {
        debug!(property, value = ?value, "Writing beam control property");
        self.remote.set_beam_property(property, value)?;
        self.refresh()?;
        Ok(())
    }

    pub fn dwell_time(&self) -> f64 {
        self.state.dwell_time
    }

    pub fn set_dwell_time(&mut self, seconds: f64) -> Result<()> {
        self.write("DwellTime", PropertyValue::Float(seconds))
    }

    pub fn position_calibrated(&self) -> bool {
        self.state.position_calibrated
    }

    pub fn set_position_calibrated(&mut self, calibrated: bool) -> Result<()> {
        self.write("PositionCalibrated", PropertyValue::Bool(calibrated))
    }

    pub fn scan_mode(&self) -> AcquireMode {
        self.scan_mode
    }

    pub fn set_single_scan(&mut self) -> Result<()> {
        self.remote.set_single_scan()?;
        self.scan_mode = AcquireMode::Single;
        Ok(())
    }

    pub fn set_continuous_scan(&mut self) -> Result<()> {
        self.remote.set_continuous_scan()?;
        self.scan_mode = AcquireMode::Continuous;
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.remote.start_beam()
    }

    pub fn stop(&self) -> Result<()> {
        self.remote.stop_beam()
    }

    /// Returns the beam to its rest position.
    pub fn reset(&self) -> Result<()> {
        self.remote.reset_beam()
    }

    pub fn load_positions(&self, collection: &str) -> Result<()> {
        self.remote.load_positions(collection)
    }

    /// Scans `count` points from the `start` position variable to the `end` one.
    pub fn set_line_scan(&self, start: &str, end: &str, count: u32) -> Result<()> {
        self.remote.set_line_scan(start, end, count)
    }

    /// `range` is the current value of the `range_name` workspace variable.
    /// In normalized mode it must lie inside `[-1, 1]`.
    pub fn set_frame_scan(
        &self,
        range_name: &str,
        range: &Range2D,
        n_x: u32,
        n_y: u32,
    ) -> Result<()> {
        if !self.state.position_calibrated {
            ensure_normalized("start_x", range.start().x)?;
            ensure_normalized("start_y", range.start().y)?;
            ensure_normalized("end_x", range.end().x)?;
            ensure_normalized("end_y", range.end().y)?;
        }
        self.remote.set_frame_scan(range_name, n_x, n_y)
    }

    pub fn move_beam(&self, x: f64, y: f64) -> Result<()> {
        if !self.state.position_calibrated {
            ensure_normalized("x", x)?;
            ensure_normalized("y", y)?;
        }
        self.remote.move_beam(Position2D::new(x, y))
    }

    pub fn can_start(&self) -> Result<bool> {
        self.remote.beam_can_start()
    }

    pub fn is_scanning(&self) -> Result<bool> {
        self.remote.beam_is_scanning()
    }
}

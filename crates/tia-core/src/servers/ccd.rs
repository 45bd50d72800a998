use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::modes::AcquireMode;
use crate::ports::{PropertyValue, RemoteRef};
use crate::values::{Position2D, Range1D, Range2D};

/// Server-reported bounds. Advisory only; never written locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CcdAllowedRanges {
    pub integration_time: Range1D,
    pub readout_range: Range2D,
    pub pixel_readout_range: Range2D,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CcdState {
    pub acquire_mode: AcquireMode,
    pub camera: String,
    pub camera_inserted: bool,
    pub integration_time: f64,
    pub readout_range: Range2D,
    pub pixel_readout_range: Range2D,
    pub binning: i64,
    pub reference_position: Position2D,
    pub readout_rate: f64,
    pub drift_rate: Position2D,
    pub bias_correction: bool,
    pub gain_correction: bool,
    pub series_size: i64,
    pub allowed: CcdAllowedRanges,
}

pub struct CcdServerProxy {
    remote: RemoteRef,
    state: CcdState,
}

impl CcdServerProxy {
    pub fn load(remote: RemoteRef) -> Result<Self> {
        let state = remote.ccd_server()?;
        Ok(Self { remote, state })
    }

    pub fn refresh(&mut self) -> Result<&CcdState> {
        self.state = self.remote.ccd_server()?;
        Ok(&self.state)
    }

    pub fn state(&self) -> &CcdState {
        &self.state
    }

    fn write(&mut self, property: &str, value: PropertyValue) -> Result<()> {
        debug!(property, value = ?value, "Writing CCD server property");
        self.remote.set_ccd_property(property, value)?;
        self.refresh()?;
        Ok(())
    }

    pub fn acquire_mode(&self) -> AcquireMode {
        self.state.acquire_mode
    }

    pub fn set_acquire_mode(&mut self, mode: AcquireMode) -> Result<()> {
        self.write("AcquireMode", PropertyValue::Int(mode.code()))
    }

    pub fn camera(&self) -> &str {
        &self.state.camera
    }

    pub fn set_camera(&mut self, camera: &str) -> Result<()> {
        self.write("Camera", PropertyValue::Text(camera.to_string()))
    }

    pub fn camera_inserted(&self) -> bool {
        self.state.camera_inserted
    }

    pub fn set_camera_inserted(&mut self, inserted: bool) -> Result<()> {
        self.write("CameraInserted", PropertyValue::Bool(inserted))
    }

    pub fn integration_time(&self) -> f64 {
        self.state.integration_time
    }

    pub fn set_integration_time(&mut self, seconds: f64) -> Result<()> {
        self.write("IntegrationTime", PropertyValue::Float(seconds))
    }

    pub fn binning(&self) -> i64 {
        self.state.binning
    }

    pub fn set_binning(&mut self, binning: i64) -> Result<()> {
        self.write("Binning", PropertyValue::Int(binning))
    }

    pub fn readout_rate(&self) -> f64 {
        self.state.readout_rate
    }

    pub fn set_readout_rate(&mut self, rate: f64) -> Result<()> {
        self.write("ReadoutRate", PropertyValue::Float(rate))
    }

    pub fn drift_rate(&self) -> Position2D {
        self.state.drift_rate
    }

    /// Writes whichever components are given, then refreshes once.
    pub fn set_drift_rate(&mut self, x: Option<f64>, y: Option<f64>) -> Result<()> {
        if let Some(x) = x {
            self.remote.set_ccd_property("DriftRateX", PropertyValue::Float(x))?;
        }
        if let Some(y) = y {
            self.remote.set_ccd_property("DriftRateY", PropertyValue::Float(y))?;
        }
        self.refresh()?;
        Ok(())
    }

    pub fn bias_correction(&self) -> bool {
        self.state.bias_correction
    }

    pub fn set_bias_correction(&mut self, enabled: bool) -> Result<()> {
        self.write("BiasCorrection", PropertyValue::Bool(enabled))
    }

    pub fn gain_correction(&self) -> bool {
        self.state.gain_correction
    }

    pub fn set_gain_correction(&mut self, enabled: bool) -> Result<()> {
        self.write("GainCorrection", PropertyValue::Bool(enabled))
    }

    pub fn series_size(&self) -> i64 {
        self.state.series_size
    }

    pub fn set_series_size(&mut self, size: i64) -> Result<()> {
        self.write("SeriesSize", PropertyValue::Int(size))
    }

    pub fn reference_position(&self) -> Position2D {
        self.state.reference_position
    }

    /// `position` names a Position2D workspace variable.
    pub fn set_reference_position(&mut self, position: &str) -> Result<()> {
        self.remote.set_ccd_reference_position(position)?;
        self.refresh()?;
        Ok(())
    }

    pub fn readout_range(&self) -> Range2D {
        self.state.readout_range
    }

    /// `range` names a Range2D workspace variable.
    pub fn set_readout_range(&mut self, range: &str) -> Result<()> {
        self.remote.set_readout_range(range)?;
        self.refresh()?;
        Ok(())
    }

    pub fn pixel_readout_range(&self) -> Range2D {
        self.state.pixel_readout_range
    }

    pub fn set_pixel_readout_range(&mut self, range: &str) -> Result<()> {
        self.remote.set_pixel_readout_range(range)?;
        self.refresh()?;
        Ok(())
    }

    pub fn allowed(&self) -> &CcdAllowedRanges {
        &self.state.allowed
    }
}

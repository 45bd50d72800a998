use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::modes::{AcquireMode, MagnificationMode, ScanMode};
use crate::ports::{PropertyValue, RemoteRef};
use crate::values::{Position2D, Range1D, Range2D};

/// Server-reported bounds. Advisory only; never written locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanningAllowedRanges {
    pub dwell_time: Range1D,
    pub scan_range: Range2D,
    /// Absent in spot mode.
    pub scan_resolution: Option<Range1D>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanningState {
    pub acquire_mode: AcquireMode,
    pub frame_width: u32,
    pub frame_height: u32,
    pub dwell_time: f64,
    pub scan_resolution: f64,
    pub scan_mode: ScanMode,
    pub force_external_scan: bool,
    pub reference_position: Position2D,
    pub beam_position: Position2D,
    pub drift_rate: Position2D,
    pub scan_range: Range2D,
    pub series_size: i64,
    pub allowed: ScanningAllowedRanges,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Magnifications {
    pub imaging: Vec<String>,
    pub diffraction: Vec<String>,
}

pub struct ScanningServerProxy {
    remote: RemoteRef,
    state: ScanningState,
    magnifications: Magnifications,
}

impl ScanningServerProxy {
    pub fn load(remote: RemoteRef) -> Result<Self> {
        let state = remote.scanning_server()?;
        let magnifications = read_magnifications(&remote)?;
        Ok(Self {
            remote,
            state,
            magnifications,
        })
    }

    pub fn refresh(&mut self) -> Result<&ScanningState> {
        let state = self.remote.scanning_server()?;
        let magnifications = read_magnifications(&self.remote)?;
        self.state = state;
        self.magnifications = magnifications;
        Ok(&self.state)
    }

    pub fn state(&self) -> &ScanningState {
        &self.state
    }

    fn write(&mut self, property: &str, value: PropertyValue) -> Result<()> {
        debug!(property, value = ?value, "Writing scanning server property");
        self.remote.set_scanning_property(property, value)?;
        self.refresh()?;
        Ok(())
    }

    pub fn acquire_mode(&self) -> AcquireMode {
        self.state.acquire_mode
    }

    pub fn set_acquire_mode(&mut self, mode: AcquireMode) -> Result<()> {
        self.write("AcquireMode", PropertyValue::Int(mode.code()))
    }

    /// `(width, height)` in pixels.
    pub fn frame_shape(&self) -> (u32, u32) {
        (self.state.frame_width, self.state.frame_height)
    }

    pub fn set_frame_shape(&mut self, width: u32, height: u32) -> Result<()> {
        self.remote
            .set_scanning_property("FrameWidth", PropertyValue::Int(i64::from(width)))?;
        self.remote
            .set_scanning_property("FrameHeight", PropertyValue::Int(i64::from(height)))?;
        self.refresh()?;
        Ok(())
    }

    pub fn dwell_time(&self) -> f64 {
        self.state.dwell_time
    }

    pub fn set_dwell_time(&mut self, seconds: f64) -> Result<()> {
        self.write("DwellTime", PropertyValue::Float(seconds))
    }

    pub fn scan_resolution(&self) -> f64 {
        self.state.scan_resolution
    }

    pub fn set_scan_resolution(&mut self, resolution: f64) -> Result<()> {
        self.write("ScanResolution", PropertyValue::Float(resolution))
    }

    pub fn scan_mode(&self) -> ScanMode {
        self.state.scan_mode
    }

    /// Changing the mode can move the allowed dwell-time and resolution bounds.
    pub fn set_scan_mode(&mut self, mode: ScanMode) -> Result<()> {
        self.write("ScanMode", PropertyValue::Int(mode.code()))
    }

    pub fn force_external_scan(&self) -> bool {
        self.state.force_external_scan
    }

    pub fn set_force_external_scan(&mut self, enabled: bool) -> Result<()> {
        self.write("ForceExternalScan", PropertyValue::Bool(enabled))
    }

    pub fn drift_rate(&self) -> Position2D {
        self.state.drift_rate
    }

    pub fn set_drift_rate(&mut self, x: Option<f64>, y: Option<f64>) -> Result<()> {
        if let Some(x) = x {
            self.remote
                .set_scanning_property("DriftRateX", PropertyValue::Float(x))?;
        }
        if let Some(y) = y {
            self.remote
                .set_scanning_property("DriftRateY", PropertyValue::Float(y))?;
        }
        self.refresh()?;
        Ok(())
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

    pub fn set_reference_position(&mut self, position: &str) -> Result<()> {
        self.remote.set_scan_reference_position(position)?;
        self.refresh()?;
        Ok(())
    }

    pub fn beam_position(&self) -> Position2D {
        self.state.beam_position
    }

    pub fn set_beam_position(&mut self, position: &str) -> Result<()> {
        self.remote.set_beam_position(position)?;
        self.refresh()?;
        Ok(())
    }

    pub fn scan_range(&self) -> Range2D {
        self.state.scan_range
    }

    pub fn set_scan_range(&mut self, range: &str) -> Result<()> {
        self.remote.set_scan_range(range)?;
        self.refresh()?;
        Ok(())
    }

    pub fn magnifications(&self) -> &Magnifications {
        &self.magnifications
    }

    pub fn allowed(&self) -> &ScanningAllowedRanges {
        &self.state.allowed
    }
}

fn read_magnifications(remote: &RemoteRef) -> Result<Magnifications> {
    Ok(Magnifications {
        imaging: remote.magnification_names(MagnificationMode::Imaging)?,
        diffraction: remote.magnification_names(MagnificationMode::Diffraction)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapter::RemoteAdapter;
    use crate::test_support::FakeTia;

    fn proxy() -> (ScanningServerProxy, FakeTia) {
        let fake = FakeTia::new();
        let remote: RemoteRef = Arc::new(RemoteAdapter::new(fake.clone()));
        (ScanningServerProxy::load(remote).unwrap(), fake)
    }

    #[test]
    fn test_load_reads_magnifications_per_mode() {
        let (scan, _fake) = proxy();
        assert!(!scan.magnifications().imaging.is_empty());
        assert!(!scan.magnifications().diffraction.is_empty());
        assert_ne!(scan.magnifications().imaging, scan.magnifications().diffraction);
    }

    #[test]
    fn test_scan_mode_round_trip() {
        let (mut scan, _fake) = proxy();
        scan.set_scan_mode(ScanMode::Line).unwrap();
        assert_eq!(scan.scan_mode(), ScanMode::Line);
        scan.set_scan_mode("Spot".parse().unwrap()).unwrap();
        assert_eq!(scan.scan_mode(), ScanMode::Spot);
    }

    #[test]
    fn test_scan_mode_change_refreshes_derived_bounds() {
        let (mut scan, _fake) = proxy();
        scan.set_scan_mode(ScanMode::Frame).unwrap();
        let frame_bounds = scan.allowed().dwell_time;
        assert!(scan.allowed().scan_resolution.is_some());

        scan.set_scan_mode(ScanMode::Spot).unwrap();
        assert_ne!(scan.allowed().dwell_time, frame_bounds);
        assert!(scan.allowed().scan_resolution.is_none());
    }

    #[test]
    fn test_frame_shape_writes_both_dimensions() {
        let (mut scan, _fake) = proxy();
        scan.set_frame_shape(1024, 512).unwrap();
        assert_eq!(scan.frame_shape(), (1024, 512));
    }

    #[test]
    fn test_out_of_bounds_dwell_time_is_rejected_remotely() {
        let (mut scan, _fake) = proxy();
        let before = scan.dwell_time();
        let err = scan.set_dwell_time(1e9).unwrap_err();
        assert_eq!(err.code(), tia_ipc::error_codes::OUT_OF_RANGE);
        assert_eq!(scan.dwell_time(), before);
    }

    #[test]
    fn test_beam_position_from_workspace_variable() {
        let (mut scan, fake) = proxy();
        fake.seed_position2d("p", [0.25, -0.5]);
        scan.set_beam_position("p").unwrap();
        assert_eq!(scan.beam_position(), Position2D::new(0.25, -0.5));
    }

    #[test]
    fn test_reference_positions_are_partitioned_from_ccd() {
        let (mut scan, fake) = proxy();
        fake.seed_position2d("ref", [3.0, 4.0]);
        scan.set_reference_position("ref").unwrap();
        assert_eq!(scan.reference_position(), Position2D::new(3.0, 4.0));

        let remote: RemoteRef = Arc::new(RemoteAdapter::new(fake.clone()));
        let ccd = crate::servers::CcdServerProxy::load(remote).unwrap();
        assert_eq!(ccd.reference_position(), Position2D::new(0.0, 0.0));
    }
}

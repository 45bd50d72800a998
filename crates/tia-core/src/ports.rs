//! Capability ports: one narrow interface per remote capability group.
//!
//! The graph, controller and proxies depend only on these traits. The single
//! implementation over a [`tia_ipc::RemoteHandle`] lives in [`crate::adapter`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data2d::{ImageArray, ImageMetadata};
use crate::error::Result;
use crate::modes::{MagnificationMode, SignalType};
use crate::servers::{BeamState, CcdState, ScanningState};
use crate::values::{Calibration2D, Position2D, Range1D, Range2D};

/// A scalar written to a remote server property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Layout of a new display pane. Codes are passed through to the remote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayLayout {
    pub display_type: i32,
    pub display_subtype: i32,
    pub split_direction: i32,
    pub split_portion: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNames {
    pub images: Vec<String>,
    pub position_markers: Vec<String>,
}

pub trait WindowPort: Send + Sync {
    fn window_names(&self) -> Result<Vec<String>>;
    /// Creates a window; returns the name the remote assigned.
    fn add_window(&self, name: Option<&str>) -> Result<String>;
    fn close_window(&self, name: &str) -> Result<()>;
    fn activate_window(&self, name: &str) -> Result<()>;
    fn active_window_name(&self) -> Result<String>;
}

pub trait DisplayPort: Send + Sync {
    fn display_names(&self, window: &str) -> Result<Vec<String>>;
    fn add_display(&self, window: &str, display: &str, layout: DisplayLayout) -> Result<()>;
    fn delete_display(&self, window: &str, display: &str) -> Result<()>;
    fn object_names(&self, window: &str, display: &str) -> Result<ObjectNames>;
    fn position_markers(
        &self,
        window: &str,
        display: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, Position2D>>;
    fn add_image(
        &self,
        window: &str,
        display: &str,
        image: &str,
        size_x: u32,
        size_y: u32,
        calibration: &str,
    ) -> Result<()>;
    fn delete_object(&self, window: &str, display: &str, object: &str) -> Result<()>;
    fn image_metadata(&self, window: &str, display: &str, image: &str) -> Result<ImageMetadata>;
    fn image_array(&self, window: &str, display: &str, image: &str) -> Result<ImageArray>;
}

pub trait WorkspacePort: Send + Sync {
    /// Variable names mapped to their remote type tags.
    fn workspace(&self) -> Result<BTreeMap<String, String>>;

    fn create_calibration2d(&self, varname: &str, calibration: &Calibration2D) -> Result<()>;
    fn create_range2d(&self, varname: &str, start: Position2D, end: Position2D) -> Result<()>;
    fn create_range1d(&self, varname: &str, start: f64, end: f64) -> Result<()>;
    fn create_position2d(&self, varname: &str, position: Position2D) -> Result<()>;
    fn create_position_collection(&self, varname: &str) -> Result<()>;
    fn create_spatial_unit(&self, varname: &str, unit: &str) -> Result<()>;

    fn read_calibration2d(&self, varname: &str) -> Result<Calibration2D>;
    fn read_range2d(&self, varname: &str) -> Result<Range2D>;
    fn read_range1d(&self, varname: &str) -> Result<Range1D>;
    fn read_position2d(&self, varname: &str) -> Result<Position2D>;
    fn read_position_collection(&self, varname: &str) -> Result<Vec<Position2D>>;
    fn read_spatial_unit(&self, varname: &str) -> Result<String>;

    fn add_position(&self, collection: &str, position: Position2D) -> Result<()>;
    fn set_line_pattern(
        &self,
        collection: &str,
        from: Position2D,
        to: Position2D,
        count: u32,
    ) -> Result<()>;
    fn set_grid_pattern(&self, collection: &str, range: &str, n_x: u32, n_y: u32) -> Result<()>;
    fn select_positions(&self, target: &str, source: &str, start: usize, stop: usize)
    -> Result<()>;
    fn remove_all_positions(&self, collection: &str) -> Result<()>;
}

pub trait AcquisitionPort: Send + Sync {
    fn is_acquiring(&self) -> Result<bool>;
    fn can_start(&self) -> Result<bool>;
    fn can_stop(&self) -> Result<bool>;
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn acquire(&self) -> Result<()>;
    fn acquire_set(&self, collection: &str, dwell_time: f64) -> Result<()>;

    fn is_current_setup(&self) -> Result<bool>;
    fn does_setup_exist(&self, name: &str) -> Result<bool>;
    fn current_setup(&self) -> Result<String>;
    fn select_setup(&self, name: &str) -> Result<()>;
    fn add_setup(&self, name: &str) -> Result<()>;
    fn delete_setup(&self, name: &str) -> Result<()>;

    fn link_signal(&self, signal: &str, window: &str, display: &str, image: &str) -> Result<()>;
    fn unlink_signal(&self, signal: &str) -> Result<()>;
    fn unlink_all_signals(&self) -> Result<()>;
    fn signal_names(&self) -> Result<Vec<String>>;
    fn enabled_signal_names(&self) -> Result<Vec<String>>;
    fn typed_signal_names(&self, signal_type: SignalType) -> Result<Vec<String>>;
}

pub trait ScanningPort: Send + Sync {
    fn scanning_server(&self) -> Result<ScanningState>;
    fn set_scanning_property(&self, property: &str, value: PropertyValue) -> Result<()>;
    fn set_beam_position(&self, position: &str) -> Result<()>;
    fn set_scan_range(&self, range: &str) -> Result<()>;
    fn set_scan_reference_position(&self, position: &str) -> Result<()>;
    fn magnification_names(&self, mode: MagnificationMode) -> Result<Vec<String>>;
}

pub trait CcdPort: Send + Sync {
    fn ccd_server(&self) -> Result<CcdState>;
    fn set_ccd_property(&self, property: &str, value: PropertyValue) -> Result<()>;
    fn set_readout_range(&self, range: &str) -> Result<()>;
    fn set_pixel_readout_range(&self, range: &str) -> Result<()>;
    fn set_ccd_reference_position(&self, position: &str) -> Result<()>;
}

pub trait BeamPort: Send + Sync {
    fn beam_control(&self) -> Result<BeamState>;
    fn set_beam_property(&self, property: &str, value: PropertyValue) -> Result<()>;
    fn start_beam(&self) -> Result<()>;
    fn stop_beam(&self) -> Result<()>;
    fn reset_beam(&self) -> Result<()>;
    fn set_single_scan(&self) -> Result<()>;
    fn set_continuous_scan(&self) -> Result<()>;
    fn load_positions(&self, collection: &str) -> Result<()>;
    fn set_line_scan(&self, start: &str, end: &str, count: u32) -> Result<()>;
    fn set_frame_scan(&self, range: &str, n_x: u32, n_y: u32) -> Result<()>;
    fn move_beam(&self, position: Position2D) -> Result<()>;
    fn beam_can_start(&self) -> Result<bool>;
    fn beam_is_scanning(&self) -> Result<bool>;
}

/// Every capability group of one instrument session.
pub trait TiaRemote:
    WindowPort + DisplayPort + WorkspacePort + AcquisitionPort + ScanningPort + CcdPort + BeamPort
{
}

impl<T> TiaRemote for T where
    T: WindowPort
        + DisplayPort
        + WorkspacePort
        + AcquisitionPort
        + ScanningPort
        + CcdPort
        + BeamPort
{
}

/// Shared handle to the session's remote; cloned into every node and proxy.
pub type RemoteRef = Arc<dyn TiaRemote>;

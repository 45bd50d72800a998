//! The single translation point between typed ports and the dynamic remote.

mod wire;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tia_common::{ValueExt, mutex_lock_or_recover};
use tia_ipc::error_codes;
use tia_ipc::{RemoteError, RemoteHandle};
use tracing::debug;

use crate::data2d::{ImageArray, ImageMetadata};
use crate::error::{Result, TiaError};
use crate::modes::{MagnificationMode, SignalType};
use crate::ports::{
    AcquisitionPort, BeamPort, CcdPort, DisplayLayout, DisplayPort, ObjectNames, PropertyValue,
    RemoteRef, ScanningPort, WindowPort, WorkspacePort,
};
use crate::servers::objects::{ACQUISITION_MANAGER, BEAM_CONTROL, CCD_SERVER, SCANNING_SERVER};
use crate::servers::{BeamState, CcdState, ScanningState};
use crate::values::{Calibration2D, Position2D, Range1D, Range2D};

use wire::{
    BeamRecord, Calibration2DRecord, CcdRecord, ImageRecord, ObjectNamesRecord,
    PositionCollectionRecord, PositionRecord, Range1DRecord, Range2DRecord, ScanningRecord,
};

/// Remote method names.
pub mod methods {
    pub const DISPLAY_WINDOW_NAMES: &str = "DisplayWindowNames";
    pub const ADD_DISPLAY_WINDOW: &str = "AddDisplayWindow";
    pub const CLOSE_DISPLAY_WINDOW: &str = "CloseDisplayWindow";
    pub const ACTIVATE_DISPLAY_WINDOW: &str = "ActivateDisplayWindow";
    pub const ACTIVE_DISPLAY_WINDOW_NAME: &str = "ActiveDisplayWindowName";

    pub const DISPLAY_NAMES: &str = "DisplayNames";
    pub const ADD_DISPLAY: &str = "AddDisplay";
    pub const DELETE_DISPLAY: &str = "DeleteDisplay";
    pub const OBJECT_NAMES: &str = "ObjectNames";
    pub const GET_POSITION_MARKERS: &str = "GetPositionMarkers";
    pub const ADD_IMAGE: &str = "AddImage";
    pub const DELETE_OBJECT: &str = "DeleteObject";
    pub const GET_IMAGE: &str = "GetImage";
    pub const GET_IMAGE_ARRAY: &str = "GetImageArray";

    pub const SHOW_WORKSPACE: &str = "ShowWorkspace";
    pub const GET_VARIABLE: &str = "GetVariable";
    pub const CALIBRATION_2D: &str = "Calibration2D";
    pub const RANGE_2D: &str = "Range2D";
    pub const RANGE_1D: &str = "Range1D";
    pub const POSITION_2D: &str = "Position2D";
    pub const POSITION_COLLECTION: &str = "PositionCollection";
    pub const SPATIAL_UNIT: &str = "SpatialUnit";
    pub const ADD_POSITION: &str = "AddPosition";
    pub const SET_LINE_PATTERN: &str = "SetLinePattern";
    pub const SET_GRID_PATTERN: &str = "SetGridPattern";
    pub const SELECTION: &str = "Selection";
    pub const REMOVE_ALL: &str = "RemoveAll";

    pub const START: &str = "Start";
    pub const STOP: &str = "Stop";
    pub const ACQUIRE: &str = "Acquire";
    pub const ACQUIRE_SET: &str = "AcquireSet";
    pub const CURRENT_SETUP: &str = "CurrentSetup";
    pub const DOES_SETUP_EXIST: &str = "DoesSetupExist";
    pub const SELECT_SETUP: &str = "SelectSetup";
    pub const ADD_SETUP: &str = "AddSetup";
    pub const DELETE_SETUP: &str = "DeleteSetup";
    pub const LINK_SIGNAL: &str = "LinkSignal";
    pub const UNLINK_SIGNAL: &str = "UnlinkSignal";
    pub const UNLINK_ALL_SIGNALS: &str = "UnlinkAllSignals";
    pub const SIGNAL_NAMES: &str = "SignalNames";
    pub const ENABLED_SIGNAL_NAMES: &str = "EnabledSignalNames";
    pub const TYPED_SIGNAL_NAMES: &str = "TypedSignalNames";

    pub const GET_SCANNING_SERVER: &str = "GetScanningServer";
    pub const SET_BEAM_POSITION: &str = "SetBeamPosition";
    pub const SET_SCAN_RANGE: &str = "SetScanRange";
    pub const SET_REFERENCE_POSITION: &str = "SetReferencePosition";
    pub const MAGNIFICATION_NAMES: &str = "MagnificationNames";

    pub const GET_CCD_SERVER: &str = "GetCCDServer";
    pub const SET_READOUT_RANGE: &str = "SetReadoutRange";
    pub const SET_PIXEL_READOUT_RANGE: &str = "SetPixelReadoutRange";

    pub const GET_BEAM_CONTROL: &str = "GetBeamControl";
    pub const START_BEAM_CONTROL: &str = "StartBeamControl";
    pub const STOP_BEAM_CONTROL: &str = "StopBeamControl";
    pub const RESET_BEAM_CONTROL: &str = "ResetBeamControl";
    pub const SET_SINGLE_SCAN: &str = "SetSingleScan";
    pub const SET_CONTINUOUS_SCAN: &str = "SetContinuousScan";
    pub const LOAD_POSITIONS: &str = "LoadPositions";
    pub const SET_LINE_SCAN: &str = "SetLineScan";
    pub const SET_FRAME_SCAN: &str = "SetFrameScan";
    pub const MOVE_BEAM: &str = "MoveBeam";
}

use methods::*;

fn map_remote_error(operation: &'static str, err: RemoteError) -> TiaError {
    match err {
        RemoteError::Rpc { code, message, .. } if code == error_codes::INVALID_MODE => {
            TiaError::InvalidMode { operation, message }
        }
        RemoteError::Rpc { code, message, .. } if code == error_codes::SETUP_NOT_FOUND => {
            TiaError::SetupNotFound(message)
        }
        other => TiaError::remote(operation, other),
    }
}

fn property_json(value: PropertyValue) -> Value {
    match value {
        PropertyValue::Bool(b) => json!(b),
        PropertyValue::Int(i) => json!(i),
        PropertyValue::Float(f) => json!(f),
        PropertyValue::Text(s) => json!(s),
    }
}

/// Implements every port over one [`RemoteHandle`]. Calls are serialized
/// through an internal mutex.
pub struct RemoteAdapter<H: RemoteHandle> {
    handle: Mutex<H>,
}

impl<H: RemoteHandle + 'static> RemoteAdapter<H> {
    /// Wraps `handle` as the session reference every component is built from.
    pub fn shared(handle: H) -> RemoteRef {
        Arc::new(Self::new(handle))
    }
}

impl<H: RemoteHandle> RemoteAdapter<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle: Mutex::new(handle),
        }
    }

    fn call(&self, method: &'static str, params: Option<Value>) -> Result<Value> {
        debug!(method, "Remote call");
        let mut handle = mutex_lock_or_recover(&self.handle);
        handle
            .call(method, params)
            .map_err(|e| map_remote_error(method, e))
    }

    fn call_unit(&self, method: &'static str, params: Value) -> Result<()> {
        self.call(method, Some(params)).map(|_| ())
    }

    fn call_decode<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<T> {
        let value = self.call(method, params)?;
        serde_json::from_value(value).map_err(|e| TiaError::malformed(method, e))
    }

    fn call_names(&self, method: &'static str, params: Option<Value>) -> Result<Vec<String>> {
        self.call(method, params)?
            .string_list()
            .ok_or_else(|| TiaError::malformed(method, "expected a list of names"))
    }

    fn call_string(&self, method: &'static str, params: Option<Value>) -> Result<String> {
        match self.call(method, params)? {
            Value::String(s) => Ok(s),
            other => Err(TiaError::malformed(
                method,
                format!("expected a string, got {}", other),
            )),
        }
    }

    fn variable<T: DeserializeOwned>(&self, varname: &str) -> Result<T> {
        self.call_decode(GET_VARIABLE, Some(json!({ "varname": varname })))
    }

    fn get_flag(&self, object: &str, property: &'static str) -> Result<bool> {
        debug!(object, property, "Remote property read");
        let value = mutex_lock_or_recover(&self.handle)
            .get_property(object, property)
            .map_err(|e| map_remote_error(property, e))?;
        value
            .as_bool()
            .ok_or_else(|| TiaError::malformed(property, "expected a boolean"))
    }

    fn set_property(&self, object: &str, property: &str, value: PropertyValue) -> Result<()> {
        debug!(object, property, "Remote property write");
        mutex_lock_or_recover(&self.handle)
            .set_property(object, property, property_json(value))
            .map_err(|e| map_remote_error(tia_ipc::SET_PROPERTY, e))
    }
}

impl<H: RemoteHandle> WindowPort for RemoteAdapter<H> {
    fn window_names(&self) -> Result<Vec<String>> {
        self.call_names(DISPLAY_WINDOW_NAMES, None)
    }

    fn add_window(&self, name: Option<&str>) -> Result<String> {
        let params = name.map(|n| json!({ "name": n }));
        self.call_string(ADD_DISPLAY_WINDOW, params)
    }

    fn close_window(&self, name: &str) -> Result<()> {
        self.call_unit(CLOSE_DISPLAY_WINDOW, json!({ "window": name }))
    }

    fn activate_window(&self, name: &str) -> Result<()> {
        self.call_unit(ACTIVATE_DISPLAY_WINDOW, json!({ "window": name }))
    }

    fn active_window_name(&self) -> Result<String> {
        self.call_string(ACTIVE_DISPLAY_WINDOW_NAME, None)
    }
}

impl<H: RemoteHandle> DisplayPort for RemoteAdapter<H> {
    fn display_names(&self, window: &str) -> Result<Vec<String>> {
        self.call_names(DISPLAY_NAMES, Some(json!({ "window": window })))
    }

    fn add_display(&self, window: &str, display: &str, layout: DisplayLayout) -> Result<()> {
        self.call_unit(
            ADD_DISPLAY,
            json!({
                "window": window,
                "display": display,
                "display_type": layout.display_type,
                "display_subtype": layout.display_subtype,
                "split_direction": layout.split_direction,
                "split_portion": layout.split_portion,
            }),
        )
    }

    fn delete_display(&self, window: &str, display: &str) -> Result<()> {
        self.call_unit(
            DELETE_DISPLAY,
            json!({ "window": window, "display": display }),
        )
    }

    fn object_names(&self, window: &str, display: &str) -> Result<ObjectNames> {
        let record: ObjectNamesRecord = self.call_decode(
            OBJECT_NAMES,
            Some(json!({ "window": window, "display": display })),
        )?;
        Ok(ObjectNames {
            images: record.images,
            position_markers: record.position_markers,
        })
    }

    fn position_markers(
        &self,
        window: &str,
        display: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, Position2D>> {
        if names.is_empty() {
            return Ok(BTreeMap::new());
        }
        let markers: BTreeMap<String, PositionRecord> = self.call_decode(
            GET_POSITION_MARKERS,
            Some(json!({ "window": window, "display": display, "markers": names })),
        )?;
        Ok(markers
            .into_iter()
            .map(|(name, position)| (name, position.into()))
            .collect())
    }

    fn add_image(
        &self,
        window: &str,
        display: &str,
        image: &str,
        size_x: u32,
        size_y: u32,
        calibration: &str,
    ) -> Result<()> {
        self.call_unit(
            ADD_IMAGE,
            json!({
                "window": window,
                "display": display,
                "image": image,
                "size_x": size_x,
                "size_y": size_y,
                "calibration": calibration,
            }),
        )
    }

    fn delete_object(&self, window: &str, display: &str, object: &str) -> Result<()> {
        self.call_unit(
            DELETE_OBJECT,
            json!({ "window": window, "display": display, "object": object }),
        )
    }

    fn image_metadata(&self, window: &str, display: &str, image: &str) -> Result<ImageMetadata> {
        let record: ImageRecord = self.call_decode(
            GET_IMAGE,
            Some(json!({ "window": window, "display": display, "image": image })),
        )?;
        Ok(record.into())
    }

    fn image_array(&self, window: &str, display: &str, image: &str) -> Result<ImageArray> {
        let rows: Vec<Vec<f64>> = self.call_decode(
            GET_IMAGE_ARRAY,
            Some(json!({ "window": window, "display": display, "image": image })),
        )?;
        ImageArray::from_rows(rows)
    }
}

impl<H: RemoteHandle> WorkspacePort for RemoteAdapter<H> {
    fn workspace(&self) -> Result<BTreeMap<String, String>> {
        self.call_decode(SHOW_WORKSPACE, None)
    }

    fn create_calibration2d(&self, varname: &str, calibration: &Calibration2D) -> Result<()> {
        self.call_unit(
            CALIBRATION_2D,
            json!({
                "varname": varname,
                "offset_x": calibration.offset_x,
                "offset_y": calibration.offset_y,
                "delta_x": calibration.delta_x,
                "delta_y": calibration.delta_y,
                "cal_index_x": calibration.cal_index_x,
                "cal_index_y": calibration.cal_index_y,
            }),
        )
    }

    fn create_range2d(&self, varname: &str, start: Position2D, end: Position2D) -> Result<()> {
        self.call_unit(
            RANGE_2D,
            json!({
                "varname": varname,
                "start_x": start.x,
                "start_y": start.y,
                "end_x": end.x,
                "end_y": end.y,
            }),
        )
    }

    fn create_range1d(&self, varname: &str, start: f64, end: f64) -> Result<()> {
        self.call_unit(
            RANGE_1D,
            json!({ "varname": varname, "start": start, "end": end }),
        )
    }

    fn create_position2d(&self, varname: &str, position: Position2D) -> Result<()> {
        self.call_unit(
            POSITION_2D,
            json!({ "varname": varname, "x": position.x, "y": position.y }),
        )
    }

    fn create_position_collection(&self, varname: &str) -> Result<()> {
        self.call_unit(POSITION_COLLECTION, json!({ "varname": varname }))
    }

    fn create_spatial_unit(&self, varname: &str, unit: &str) -> Result<()> {
        self.call_unit(SPATIAL_UNIT, json!({ "varname": varname, "unit": unit }))
    }

    fn read_calibration2d(&self, varname: &str) -> Result<Calibration2D> {
        self.variable::<Calibration2DRecord>(varname).map(Into::into)
    }

    fn read_range2d(&self, varname: &str) -> Result<Range2D> {
        self.variable::<Range2DRecord>(varname).map(Into::into)
    }

    fn read_range1d(&self, varname: &str) -> Result<Range1D> {
        self.variable::<Range1DRecord>(varname).map(Into::into)
    }

    fn read_position2d(&self, varname: &str) -> Result<Position2D> {
        self.variable::<PositionRecord>(varname).map(Into::into)
    }

    fn read_position_collection(&self, varname: &str) -> Result<Vec<Position2D>> {
        self.variable::<PositionCollectionRecord>(varname)
            .map(PositionCollectionRecord::into_positions)
    }

    fn read_spatial_unit(&self, varname: &str) -> Result<String> {
        self.variable::<String>(varname)
    }

    fn add_position(&self, collection: &str, position: Position2D) -> Result<()> {
        self.call_unit(
            ADD_POSITION,
            json!({ "collection": collection, "x": position.x, "y": position.y }),
        )
    }

    fn set_line_pattern(
        &self,
        collection: &str,
        from: Position2D,
        to: Position2D,
        count: u32,
    ) -> Result<()> {
        self.call_unit(
            SET_LINE_PATTERN,
            json!({
                "collection": collection,
                "x0": from.x,
                "y0": from.y,
                "x1": to.x,
                "y1": to.y,
                "count": count,
            }),
        )
    }

    fn set_grid_pattern(&self, collection: &str, range: &str, n_x: u32, n_y: u32) -> Result<()> {
        self.call_unit(
            SET_GRID_PATTERN,
            json!({ "collection": collection, "range": range, "nx": n_x, "ny": n_y }),
        )
    }

    fn select_positions(
        &self,
        target: &str,
        source: &str,
        start: usize,
        stop: usize,
    ) -> Result<()> {
        self.call_unit(
            SELECTION,
            json!({ "varname": target, "source": source, "start": start, "stop": stop }),
        )
    }

    fn remove_all_positions(&self, collection: &str) -> Result<()> {
        self.call_unit(REMOVE_ALL, json!({ "collection": collection }))
    }
}

impl<H: RemoteHandle> AcquisitionPort for RemoteAdapter<H> {
    fn is_acquiring(&self) -> Result<bool> {
        self.get_flag(ACQUISITION_MANAGER, "IsAcquiring")
    }

    fn can_start(&self) -> Result<bool> {
        self.get_flag(ACQUISITION_MANAGER, "CanStart")
    }

    fn can_stop(&self) -> Result<bool> {
        self.get_flag(ACQUISITION_MANAGER, "CanStop")
    }

    fn start(&self) -> Result<()> {
        self.call(START, None).map(|_| ())
    }

    fn stop(&self) -> Result<()> {
        self.call(STOP, None).map(|_| ())
    }

    fn acquire(&self) -> Result<()> {
        self.call(ACQUIRE, None).map(|_| ())
    }

    fn acquire_set(&self, collection: &str, dwell_time: f64) -> Result<()> {
        self.call_unit(
            ACQUIRE_SET,
            json!({ "collection": collection, "dwell_time": dwell_time }),
        )
    }

    fn is_current_setup(&self) -> Result<bool> {
        self.get_flag(ACQUISITION_MANAGER, "IsCurrentSetup")
    }

    fn does_setup_exist(&self, name: &str) -> Result<bool> {
        self.call(DOES_SETUP_EXIST, Some(json!({ "setup": name })))?
            .as_bool()
            .ok_or_else(|| TiaError::malformed(DOES_SETUP_EXIST, "expected a boolean"))
    }

    fn current_setup(&self) -> Result<String> {
        self.call_string(CURRENT_SETUP, None)
    }

    fn select_setup(&self, name: &str) -> Result<()> {
        self.call_unit(SELECT_SETUP, json!({ "setup": name }))
            .map_err(|e| match e {
                TiaError::SetupNotFound(_) => TiaError::SetupNotFound(name.to_string()),
                other => other,
            })
    }

    fn add_setup(&self, name: &str) -> Result<()> {
        self.call_unit(ADD_SETUP, json!({ "setup": name }))
    }

    fn delete_setup(&self, name: &str) -> Result<()> {
        self.call_unit(DELETE_SETUP, json!({ "setup": name }))
            .map_err(|e| match e {
                TiaError::SetupNotFound(_) => TiaError::SetupNotFound(name.to_string()),
                other => other,
            })
    }

    fn link_signal(&self, signal: &str, window: &str, display: &str, image: &str) -> Result<()> {
        self.call_unit(
            LINK_SIGNAL,
            json!({ "signal": signal, "window": window, "display": display, "image": image }),
        )
    }

    fn unlink_signal(&self, signal: &str) -> Result<()> {
        self.call_unit(UNLINK_SIGNAL, json!({ "signal": signal }))
    }

    fn unlink_all_signals(&self) -> Result<()> {
        self.call(UNLINK_ALL_SIGNALS, None).map(|_| ())
    }

    fn signal_names(&self) -> Result<Vec<String>> {
        self.call_names(SIGNAL_NAMES, None)
    }

    fn enabled_signal_names(&self) -> Result<Vec<String>> {
        self.call_names(ENABLED_SIGNAL_NAMES, None)
    }

    fn typed_signal_names(&self, signal_type: SignalType) -> Result<Vec<String>> {
        self.call_names(
            TYPED_SIGNAL_NAMES,
            Some(json!({ "type": signal_type.code() })),
        )
    }
}

impl<H: RemoteHandle> ScanningPort for RemoteAdapter<H> {
    fn scanning_server(&self) -> Result<ScanningState> {
        self.call_decode::<ScanningRecord>(GET_SCANNING_SERVER, None)?
            .into_state()
    }

    fn set_scanning_property(&self, property: &str, value: PropertyValue) -> Result<()> {
        self.set_property(SCANNING_SERVER, property, value)
    }

    fn set_beam_position(&self, position: &str) -> Result<()> {
        self.call_unit(SET_BEAM_POSITION, json!({ "position": position }))
    }

    fn set_scan_range(&self, range: &str) -> Result<()> {
        self.call_unit(SET_SCAN_RANGE, json!({ "range": range }))
    }

    fn set_scan_reference_position(&self, position: &str) -> Result<()> {
        self.call_unit(
            SET_REFERENCE_POSITION,
            json!({ "position": position, "server": "scan" }),
        )
    }

    fn magnification_names(&self, mode: MagnificationMode) -> Result<Vec<String>> {
        self.call_names(MAGNIFICATION_NAMES, Some(json!({ "mode": mode.code() })))
    }
}

impl<H: RemoteHandle> CcdPort for RemoteAdapter<H> {
    fn ccd_server(&self) -> Result<CcdState> {
        self.call_decode::<CcdRecord>(GET_CCD_SERVER, None)?
            .into_state()
    }

    fn set_ccd_property(&self, property: &str, value: PropertyValue) -> Result<()> {
        self.set_property(CCD_SERVER, property, value)
    }

    fn set_readout_range(&self, range: &str) -> Result<()> {
        self.call_unit(SET_READOUT_RANGE, json!({ "range": range }))
    }

    fn set_pixel_readout_range(&self, range: &str) -> Result<()> {
        self.call_unit(SET_PIXEL_READOUT_RANGE, json!({ "range": range }))
    }

    fn set_ccd_reference_position(&self, position: &str) -> Result<()> {
        self.call_unit(
            SET_REFERENCE_POSITION,
            json!({ "position": position, "server": "ccd" }),
        )
    }
}

impl<H: RemoteHandle> BeamPort for RemoteAdapter<H> {
    fn beam_control(&self) -> Result<BeamState> {
        self.call_decode::<BeamRecord>(GET_BEAM_CONTROL, None)
            .map(Into::into)
    }

    fn set_beam_property(&self, property: &str, value: PropertyValue) -> Result<()> {
        self.set_property(BEAM_CONTROL, property, value)
    }

    fn start_beam(&self) -> Result<()> {
        self.call(START_BEAM_CONTROL, None).map(|_| ())
    }

    fn stop_beam(&self) -> Result<()> {
        self.call(STOP_BEAM_CONTROL, None).map(|_| ())
    }

    fn reset_beam(&self) -> Result<()> {
        self.call(RESET_BEAM_CONTROL, None).map(|_| ())
    }

    fn set_single_scan(&self) -> Result<()> {
        self.call(SET_SINGLE_SCAN, None).map(|_| ())
    }

    fn set_continuous_scan(&self) -> Result<()> {
        self.call(SET_CONTINUOUS_SCAN, None).map(|_| ())
    }

    fn load_positions(&self, collection: &str) -> Result<()> {
        self.call_unit(LOAD_POSITIONS, json!({ "collection": collection }))
    }

    fn set_line_scan(&self, start: &str, end: &str, count: u32) -> Result<()> {
        self.call_unit(
            SET_LINE_SCAN,
            json!({ "start": start, "end": end, "count": count }),
        )
    }

    fn set_frame_scan(&self, range: &str, n_x: u32, n_y: u32) -> Result<()> {
        self.call_unit(
            SET_FRAME_SCAN,
            json!({ "range": range, "nx": n_x, "ny": n_y }),
        )
    }

    fn move_beam(&self, position: Position2D) -> Result<()> {
        self.call_unit(MOVE_BEAM, json!({ "x": position.x, "y": position.y }))
    }

    fn beam_can_start(&self) -> Result<bool> {
        self.get_flag(BEAM_CONTROL, "CanStart")
    }

    fn beam_is_scanning(&self) -> Result<bool> {
        self.get_flag(BEAM_CONTROL, "IsScanning")
    }
}

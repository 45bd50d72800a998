use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value, json};
use tia_common::{ValueExt, mutex_lock_or_recover, resolve_name};
use tia_ipc::error_codes::{
    INVALID_MODE, INVALID_PARAMS, METHOD_NOT_FOUND, OBJECT_NOT_FOUND, OUT_OF_RANGE,
    REMOTE_REJECTED, RESOURCE_LIMIT, SETUP_NOT_FOUND, VARIABLE_TYPE_CONFLICT,
};
use tia_ipc::{GET_PROPERTY, RemoteError, RemoteHandle, SET_PROPERTY};

use super::records;
use crate::adapter::methods::*;
use crate::servers::objects::{ACQUISITION_MANAGER, BEAM_CONTROL, CCD_SERVER, SCANNING_SERVER};

type Reply = Result<Value, RemoteError>;

const SCAN_MODE_SPOT: i64 = 0;

fn missing(key: &str) -> RemoteError {
    RemoteError::rpc(
        INVALID_PARAMS,
        format!("missing or invalid parameter '{}'", key),
    )
}

fn not_found(kind: &str, name: &str) -> RemoteError {
    RemoteError::rpc(OBJECT_NOT_FOUND, format!("{} '{}' not found", kind, name))
}

fn wrong_type(name: &str, expected: &str) -> RemoteError {
    RemoteError::rpc(
        VARIABLE_TYPE_CONFLICT,
        format!("variable '{}' is not a {}", name, expected),
    )
}

fn text<'a>(params: &'a Value, key: &str) -> Result<&'a str, RemoteError> {
    params.str_field(key).ok_or_else(|| missing(key))
}

fn number(params: &Value, key: &str) -> Result<f64, RemoteError> {
    params.f64_field(key).ok_or_else(|| missing(key))
}

fn count(params: &Value, key: &str) -> Result<u64, RemoteError> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| missing(key))
}

/// `n` evenly spaced values from `a` to `b`, both included.
fn linspace(a: f64, b: f64, n: u64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => (0..n)
            .map(|i| a + (b - a) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Calibration {
    offset: [f64; 2],
    delta: [f64; 2],
    cal_index: [i64; 2],
}

impl Calibration {
    fn to_json(self) -> Value {
        json!({
            "OffsetX": self.offset[0],
            "OffsetY": self.offset[1],
            "DeltaX": self.delta[0],
            "DeltaY": self.delta[1],
            "CalIndexX": self.cal_index[0],
            "CalIndexY": self.cal_index[1],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Variable {
    Calibration2D(Calibration),
    Range2D { start: [f64; 2], end: [f64; 2] },
    Range1D { start: f64, end: f64 },
    Position2D([f64; 2]),
    PositionCollection(Vec<[f64; 2]>),
    SpatialUnit(String),
    /// A variable kind the client does not model; only its tag is visible.
    Opaque(String),
}

impl Variable {
    fn tag(&self) -> &str {
        match self {
            Variable::Calibration2D(_) => "Calibration2D",
            Variable::Range2D { .. } => "Range2D",
            Variable::Range1D { .. } => "Range1D",
            Variable::Position2D(_) => "Position2D",
            Variable::PositionCollection(_) => "PositionCollection",
            Variable::SpatialUnit(_) => "SpatialUnit",
            Variable::Opaque(tag) => tag,
        }
    }

    fn to_json(&self) -> Option<Value> {
        let value = match self {
            Variable::Calibration2D(c) => c.to_json(),
            Variable::Range2D { start, end } => records::range2d(*start, *end),
            Variable::Range1D { start, end } => records::range1d(*start, *end),
            Variable::Position2D(p) => json!(p),
            Variable::PositionCollection(items) => {
                json!({ "Count": items.len(), "Items": items })
            }
            Variable::SpatialUnit(unit) => json!(unit),
            Variable::Opaque(_) => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
struct FakeImage {
    calibration: Calibration,
    size: [u64; 2],
}

#[derive(Debug, Clone)]
struct FakeDisplay {
    name: String,
    split_portion: f64,
    images: BTreeMap<String, FakeImage>,
    markers: BTreeMap<String, [f64; 2]>,
}

#[derive(Debug, Clone, Default)]
struct FakeWindow {
    displays: Vec<FakeDisplay>,
}

#[derive(Debug, Clone)]
struct FakeSignal {
    name: String,
    signal_type: i64,
    enabled: bool,
}

impl FakeSignal {
    fn new(name: &str, signal_type: i64, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            signal_type,
            enabled,
        }
    }
}

#[derive(Debug)]
struct State {
    windows: BTreeMap<String, FakeWindow>,
    active_window: Option<String>,
    window_limit: Option<usize>,
    variables: BTreeMap<String, Variable>,
    setups: BTreeMap<String, i64>,
    current_setup: Option<String>,
    signals: Vec<FakeSignal>,
    links: BTreeMap<String, [String; 3]>,
    acquiring: bool,
    acquisitions: usize,
    scanning: Value,
    ccd: Value,
    beam: Value,
    beam_scanning: bool,
    calls: Vec<(String, Option<Value>)>,
}

impl Default for State {
    fn default() -> Self {
        let setups = [("Image".to_string(), 2), ("Spot".to_string(), SCAN_MODE_SPOT)]
            .into_iter()
            .collect();
        Self {
            windows: BTreeMap::new(),
            active_window: None,
            window_limit: None,
            variables: BTreeMap::new(),
            setups,
            current_setup: Some("Image".to_string()),
            signals: vec![
                FakeSignal::new("BF", 0, true),
                FakeSignal::new("HAADF", 0, true),
                FakeSignal::new("DF2", 0, false),
                FakeSignal::new("BM-Ceta", 6, true),
            ],
            links: BTreeMap::new(),
            acquiring: false,
            acquisitions: 0,
            scanning: records::scanning_record(),
            ccd: records::ccd_record(),
            beam: records::beam_record(),
            beam_scanning: false,
            calls: Vec::new(),
        }
    }
}

/// Rewrites the scan-mode dependent bounds and clamps the dwell time into them.
fn apply_scan_mode(record: &mut Value) {
    let spot = record.i64_field("ScanMode") == Some(SCAN_MODE_SPOT);
    let (lo, hi) = if spot { (1e-3, 1e3) } else { (1e-6, 1e-2) };
    record["DwellTimeRange"] = records::range1d(lo, hi);
    record["ScanResolutionRange"] = if spot {
        Value::Null
    } else {
        records::range1d(0.1, 1.0)
    };
    let dwell = record.f64_field("DwellTime").unwrap_or(lo);
    record["DwellTime"] = json!(dwell.clamp(lo, hi));
}

fn check_bounds(record: &Value, range_key: &str, property: &str, value: &Value) -> Result<(), RemoteError> {
    let (Some(range), Some(v)) = (record.get(range_key), value.as_f64()) else {
        return Err(missing("value"));
    };
    let start = range.f64_field("Start").unwrap_or(f64::MIN);
    let end = range.f64_field("End").unwrap_or(f64::MAX);
    if v < start || v > end {
        return Err(RemoteError::rpc(
            OUT_OF_RANGE,
            format!("{} {} outside [{}, {}]", property, v, start, end),
        ));
    }
    Ok(())
}

fn check_code(property: &str, value: &Value, max: i64) -> Result<(), RemoteError> {
    match value.as_i64() {
        Some(code) if (0..=max).contains(&code) => Ok(()),
        _ => Err(RemoteError::rpc(
            OUT_OF_RANGE,
            format!("{} {} is not a valid mode", property, value),
        )),
    }
}

fn range_within(total: &Value, start: [f64; 2], end: [f64; 2]) -> bool {
    let field = |key: &str, default: f64| total.f64_field(key).unwrap_or(default);
    start[0] >= field("StartX", f64::MIN)
        && start[1] >= field("StartY", f64::MIN)
        && end[0] <= field("EndX", f64::MAX)
        && end[1] <= field("EndY", f64::MAX)
}

/// Writes a scalar field of a server record. Structured fields are only
/// writable through workspace variables.
fn write_field(record: &mut Value, object: &str, property: &str, value: Value) -> Reply {
    match record.get(property) {
        None => return Err(not_found(&format!("{} property", object), property)),
        Some(Value::Object(_)) | Some(Value::Array(_)) => {
            return Err(RemoteError::rpc(
                INVALID_PARAMS,
                format!("{} is set through a workspace variable", property),
            ));
        }
        Some(_) => {}
    }
    record[property] = value;
    Ok(Value::Null)
}

impl State {
    fn dispatch(&mut self, method: &str, p: &Value) -> Reply {
        match method {
            DISPLAY_WINDOW_NAMES => Ok(json!(self.windows.keys().collect::<Vec<_>>())),
            ADD_DISPLAY_WINDOW => self.add_window(p),
            CLOSE_DISPLAY_WINDOW => self.close_window(p),
            ACTIVATE_DISPLAY_WINDOW => {
                let name = text(p, "window")?;
                self.window(name)?;
                self.active_window = Some(name.to_string());
                Ok(Value::Null)
            }
            ACTIVE_DISPLAY_WINDOW_NAME => Ok(json!(self.active_window.clone().unwrap_or_default())),

            DISPLAY_NAMES => {
                let window = self.window(text(p, "window")?)?;
                let names: Vec<&str> = window.displays.iter().map(|d| d.name.as_str()).collect();
                Ok(json!(names))
            }
            ADD_DISPLAY => self.add_display(p),
            DELETE_DISPLAY => {
                let name = text(p, "display")?;
                let window = self.window_mut(text(p, "window")?)?;
                let before = window.displays.len();
                window.displays.retain(|d| d.name != name);
                if window.displays.len() == before {
                    return Err(not_found("display", name));
                }
                Ok(Value::Null)
            }
            OBJECT_NAMES => {
                let display = self.display(p)?;
                Ok(json!({
                    "Images": display.images.keys().collect::<Vec<_>>(),
                    "Position Markers": display.markers.keys().collect::<Vec<_>>(),
                }))
            }
            GET_POSITION_MARKERS => self.position_markers(p),
            ADD_IMAGE => self.add_image(p),
            DELETE_OBJECT => {
                let object = text(p, "object")?;
                let display = self.display_mut(p)?;
                if display.images.remove(object).is_none() && display.markers.remove(object).is_none() {
                    return Err(not_found("object", object));
                }
                Ok(Value::Null)
            }
            GET_IMAGE => {
                let image = self.image(p)?;
                let c = image.calibration;
                let [sx, sy] = image.size;
                let end = [
                    c.offset[0] + c.delta[0] * sx as f64,
                    c.offset[1] + c.delta[1] * sy as f64,
                ];
                Ok(json!({
                    "Calibration": c.to_json(),
                    "Range": records::range2d(c.offset, end),
                    "PixelsX": sx,
                    "PixelsY": sy,
                }))
            }
            GET_IMAGE_ARRAY => {
                let [sx, sy] = self.image(p)?.size;
                let rows: Vec<Vec<f64>> = (0..sy)
                    .map(|row| (0..sx).map(|col| (row * sx + col) as f64).collect())
                    .collect();
                Ok(json!(rows))
            }

            SHOW_WORKSPACE => {
                let tags: BTreeMap<&String, &str> =
                    self.variables.iter().map(|(k, v)| (k, v.tag())).collect();
                Ok(json!(tags))
            }
            GET_VARIABLE => {
                let name = text(p, "varname")?;
                let variable = self.variable(name)?;
                variable.to_json().ok_or_else(|| {
                    RemoteError::rpc(
                        REMOTE_REJECTED,
                        format!("variable '{}' of type {} cannot be read", name, variable.tag()),
                    )
                })
            }
            CALIBRATION_2D => {
                let calibration = Calibration {
                    offset: [number(p, "offset_x")?, number(p, "offset_y")?],
                    delta: [number(p, "delta_x")?, number(p, "delta_y")?],
                    cal_index: [
                        p.i64_field("cal_index_x").unwrap_or(0),
                        p.i64_field("cal_index_y").unwrap_or(0),
                    ],
                };
                self.define(text(p, "varname")?, Variable::Calibration2D(calibration))
            }
            RANGE_2D => {
                let start = [number(p, "start_x")?, number(p, "start_y")?];
                let end = [number(p, "end_x")?, number(p, "end_y")?];
                if end[0] < start[0] || end[1] < start[1] {
                    return Err(RemoteError::rpc(OUT_OF_RANGE, "range end precedes start"));
                }
                self.define(text(p, "varname")?, Variable::Range2D { start, end })
            }
            RANGE_1D => {
                let (start, end) = (number(p, "start")?, number(p, "end")?);
                if end < start {
                    return Err(RemoteError::rpc(OUT_OF_RANGE, "range end precedes start"));
                }
                self.define(text(p, "varname")?, Variable::Range1D { start, end })
            }
            POSITION_2D => {
                let position = [number(p, "x")?, number(p, "y")?];
                self.define(text(p, "varname")?, Variable::Position2D(position))
            }
            POSITION_COLLECTION => {
                self.define(text(p, "varname")?, Variable::PositionCollection(Vec::new()))
            }
            SPATIAL_UNIT => {
                let unit = text(p, "unit")?.to_string();
                self.define(text(p, "varname")?, Variable::SpatialUnit(unit))
            }
            ADD_POSITION => {
                let position = [number(p, "x")?, number(p, "y")?];
                self.collection_mut(text(p, "collection")?)?.push(position);
                Ok(Value::Null)
            }
            SET_LINE_PATTERN => {
                let n = count(p, "count")?;
                let xs = linspace(number(p, "x0")?, number(p, "x1")?, n);
                let ys = linspace(number(p, "y0")?, number(p, "y1")?, n);
                let items = self.collection_mut(text(p, "collection")?)?;
                *items = xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect();
                Ok(Value::Null)
            }
            SET_GRID_PATTERN => {
                let (start, end) = self.range2d_var(text(p, "range")?)?;
                let xs = linspace(start[0], end[0], count(p, "nx")?);
                let ys = linspace(start[1], end[1], count(p, "ny")?);
                let items = self.collection_mut(text(p, "collection")?)?;
                *items = ys
                    .iter()
                    .flat_map(|y| xs.iter().map(move |x| [*x, *y]))
                    .collect();
                Ok(Value::Null)
            }
            SELECTION => {
                let source = text(p, "source")?;
                let (start, stop) = (count(p, "start")? as usize, count(p, "stop")? as usize);
                let items = self.collection_mut(source)?.clone();
                if start > stop || stop >= items.len() {
                    return Err(RemoteError::rpc(
                        OUT_OF_RANGE,
                        format!("selection {}..={} outside '{}' of {} positions", start, stop, source, items.len()),
                    ));
                }
                let selected = items[start..=stop].to_vec();
                self.define(text(p, "varname")?, Variable::PositionCollection(selected))
            }
            REMOVE_ALL => {
                self.collection_mut(text(p, "collection")?)?.clear();
                Ok(Value::Null)
            }

            START => {
                if self.current_setup.is_none() {
                    return Err(RemoteError::rpc(REMOTE_REJECTED, "no setup selected"));
                }
                self.acquiring = true;
                Ok(Value::Null)
            }
            STOP => {
                self.acquiring = false;
                Ok(Value::Null)
            }
            ACQUIRE => {
                if self.acquiring {
                    return Err(RemoteError::rpc(REMOTE_REJECTED, "acquisition already running"));
                }
                self.acquisitions += 1;
                Ok(Value::Null)
            }
            ACQUIRE_SET => self.acquire_set(p),
            CURRENT_SETUP => self
                .current_setup
                .clone()
                .map(Value::String)
                .ok_or_else(|| RemoteError::rpc(SETUP_NOT_FOUND, "no current setup")),
            DOES_SETUP_EXIST => Ok(json!(self.setups.contains_key(text(p, "setup")?))),
            SELECT_SETUP => {
                let name = text(p, "setup")?;
                let mode = *self
                    .setups
                    .get(name)
                    .ok_or_else(|| RemoteError::rpc(SETUP_NOT_FOUND, format!("setup '{}' not found", name)))?;
                self.current_setup = Some(name.to_string());
                self.scanning["ScanMode"] = json!(mode);
                apply_scan_mode(&mut self.scanning);
                Ok(Value::Null)
            }
            ADD_SETUP => {
                let name = text(p, "setup")?;
                if self.setups.contains_key(name) {
                    return Err(RemoteError::rpc(REMOTE_REJECTED, format!("setup '{}' already exists", name)));
                }
                let mode = self.scanning.i64_field("ScanMode").unwrap_or(2);
                self.setups.insert(name.to_string(), mode);
                Ok(Value::Null)
            }
            DELETE_SETUP => {
                let name = text(p, "setup")?;
                if self.setups.remove(name).is_none() {
                    return Err(RemoteError::rpc(SETUP_NOT_FOUND, format!("setup '{}' not found", name)));
                }
                if self.current_setup.as_deref() == Some(name) {
                    self.current_setup = None;
                }
                Ok(Value::Null)
            }
            LINK_SIGNAL => {
                let signal = text(p, "signal")?;
                if !self.signals.iter().any(|s| s.name == signal) {
                    return Err(not_found("signal", signal));
                }
                self.image(p)?;
                let target = [
                    text(p, "window")?.to_string(),
                    text(p, "display")?.to_string(),
                    text(p, "image")?.to_string(),
                ];
                self.links.insert(signal.to_string(), target);
                Ok(Value::Null)
            }
            UNLINK_SIGNAL => {
                self.links.remove(text(p, "signal")?);
                Ok(Value::Null)
            }
            UNLINK_ALL_SIGNALS => {
                self.links.clear();
                Ok(Value::Null)
            }
            SIGNAL_NAMES => Ok(json!(self.signal_names(|_| true))),
            ENABLED_SIGNAL_NAMES => Ok(json!(self.signal_names(|s| s.enabled))),
            TYPED_SIGNAL_NAMES => {
                let signal_type = p.i64_field("type").ok_or_else(|| missing("type"))?;
                Ok(json!(self.signal_names(|s| s.signal_type == signal_type)))
            }

            GET_SCANNING_SERVER => Ok(self.scanning.clone()),
            SET_BEAM_POSITION => {
                let position = self.position_var(text(p, "position")?)?;
                self.scanning["BeamPosition"] = json!(position);
                Ok(Value::Null)
            }
            SET_SCAN_RANGE => {
                let (start, end) = self.range2d_var(text(p, "range")?)?;
                if !range_within(&self.scanning["TotalScanRange"], start, end) {
                    return Err(RemoteError::rpc(OUT_OF_RANGE, "scan range exceeds the field of view"));
                }
                self.scanning["ScanRange"] = records::range2d(start, end);
                Ok(Value::Null)
            }
            SET_REFERENCE_POSITION => {
                let position = json!(self.position_var(text(p, "position")?)?);
                match text(p, "server")? {
                    "scan" => self.scanning["ReferencePosition"] = position,
                    "ccd" => self.ccd["ReferencePosition"] = position,
                    _ => return Err(missing("server")),
                }
                Ok(Value::Null)
            }
            MAGNIFICATION_NAMES => match p.i64_field("mode") {
                Some(0) => Ok(json!(["LM 2000x", "SA 20000x", "SA 100000x"])),
                Some(1) => Ok(json!(["D 120mm", "D 300mm"])),
                _ => Err(missing("mode")),
            },

            GET_CCD_SERVER => Ok(self.ccd.clone()),
            SET_READOUT_RANGE => self.set_ccd_range(p, "ReadoutRange", "TotalReadoutRange"),
            SET_PIXEL_READOUT_RANGE => {
                self.set_ccd_range(p, "PixelReadoutRange", "TotalPixelReadoutRange")
            }

            GET_BEAM_CONTROL => Ok(self.beam.clone()),
            START_BEAM_CONTROL => {
                self.beam_scanning = true;
                Ok(Value::Null)
            }
            STOP_BEAM_CONTROL | RESET_BEAM_CONTROL => {
                self.beam_scanning = false;
                Ok(Value::Null)
            }
            SET_SINGLE_SCAN | SET_CONTINUOUS_SCAN => Ok(Value::Null),
            LOAD_POSITIONS => {
                self.collection_mut(text(p, "collection")?)?;
                Ok(Value::Null)
            }
            SET_LINE_SCAN => {
                self.position_var(text(p, "start")?)?;
                self.position_var(text(p, "end")?)?;
                count(p, "count")?;
                Ok(Value::Null)
            }
            SET_FRAME_SCAN => {
                self.range2d_var(text(p, "range")?)?;
                count(p, "nx")?;
                count(p, "ny")?;
                Ok(Value::Null)
            }
            MOVE_BEAM => {
                let (x, y) = (number(p, "x")?, number(p, "y")?);
                let calibrated = self.beam.bool_field("PositionCalibrated").unwrap_or(false);
                if !calibrated && (x.abs() > 1.0 || y.abs() > 1.0) {
                    return Err(RemoteError::rpc(
                        OUT_OF_RANGE,
                        format!("({}, {}) outside the normalized field of view", x, y),
                    ));
                }
                self.scanning["BeamPosition"] = json!([x, y]);
                Ok(Value::Null)
            }

            GET_PROPERTY => self.get_property(text(p, "object")?, text(p, "property")?),
            SET_PROPERTY => {
                let value = p.get("value").cloned().ok_or_else(|| missing("value"))?;
                self.set_property(text(p, "object")?, text(p, "property")?, value)
            }

            other => Err(RemoteError::rpc(
                METHOD_NOT_FOUND,
                format!("method '{}' not found", other),
            )),
        }
    }

    fn window(&self, name: &str) -> Result<&FakeWindow, RemoteError> {
        self.windows.get(name).ok_or_else(|| not_found("window", name))
    }

    fn window_mut(&mut self, name: &str) -> Result<&mut FakeWindow, RemoteError> {
        self.windows.get_mut(name).ok_or_else(|| not_found("window", name))
    }

    fn display(&self, p: &Value) -> Result<&FakeDisplay, RemoteError> {
        let name = text(p, "display")?;
        self.window(text(p, "window")?)?
            .displays
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| not_found("display", name))
    }

    fn display_mut(&mut self, p: &Value) -> Result<&mut FakeDisplay, RemoteError> {
        let name = text(p, "display")?;
        self.window_mut(text(p, "window")?)?
            .displays
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| not_found("display", name))
    }

    fn image(&self, p: &Value) -> Result<&FakeImage, RemoteError> {
        let name = text(p, "image")?;
        self.display(p)?
            .images
            .get(name)
            .ok_or_else(|| not_found("image", name))
    }

    fn add_window(&mut self, p: &Value) -> Reply {
        if let Some(limit) = self.window_limit {
            if self.windows.len() >= limit {
                return Err(RemoteError::rpc(
                    RESOURCE_LIMIT,
                    format!("window limit of {} reached", limit),
                ));
            }
        }
        let proposed = p.str_field("name").unwrap_or("Window 1");
        let name = resolve_name(proposed, self.windows.keys());
        self.windows.insert(name.clone(), FakeWindow::default());
        self.active_window = Some(name.clone());
        Ok(json!(name))
    }

    fn close_window(&mut self, p: &Value) -> Reply {
        let name = text(p, "window")?;
        if self.windows.remove(name).is_none() {
            return Err(not_found("window", name));
        }
        self.links.retain(|_, target| target[0] != name);
        if self.active_window.as_deref() == Some(name) {
            self.active_window = self.windows.keys().next_back().cloned();
        }
        Ok(Value::Null)
    }

    fn add_display(&mut self, p: &Value) -> Reply {
        let name = text(p, "display")?;
        let split_portion = number(p, "split_portion")?;
        if !(split_portion > 0.0 && split_portion <= 1.0) {
            return Err(RemoteError::rpc(
                OUT_OF_RANGE,
                format!("split portion {} outside (0, 1]", split_portion),
            ));
        }
        let window = self.window_mut(text(p, "window")?)?;
        if window.displays.iter().any(|d| d.name == name) {
            return Err(RemoteError::rpc(
                REMOTE_REJECTED,
                format!("display '{}' already exists", name),
            ));
        }
        window.displays.push(FakeDisplay {
            name: name.to_string(),
            split_portion,
            images: BTreeMap::new(),
            markers: BTreeMap::new(),
        });
        Ok(Value::Null)
    }

    fn position_markers(&self, p: &Value) -> Reply {
        let display = self.display(p)?;
        let names = p.string_list_field("markers").ok_or_else(|| missing("markers"))?;
        let mut markers = serde_json::Map::new();
        for name in names {
            let position = display
                .markers
                .get(&name)
                .ok_or_else(|| not_found("position marker", &name))?;
            markers.insert(name, json!(position));
        }
        Ok(Value::Object(markers))
    }

    fn add_image(&mut self, p: &Value) -> Reply {
        let calibration_name = text(p, "calibration")?;
        let calibration = match self.variable(calibration_name)? {
            Variable::Calibration2D(c) => *c,
            _ => return Err(wrong_type(calibration_name, "Calibration2D")),
        };
        let size = [count(p, "size_x")?, count(p, "size_y")?];
        let name = text(p, "image")?;
        let display = self.display_mut(p)?;
        if display.images.contains_key(name) {
            return Err(RemoteError::rpc(
                REMOTE_REJECTED,
                format!("image '{}' already exists", name),
            ));
        }
        display
            .images
            .insert(name.to_string(), FakeImage { calibration, size });
        Ok(Value::Null)
    }

    fn variable(&self, name: &str) -> Result<&Variable, RemoteError> {
        self.variables.get(name).ok_or_else(|| not_found("variable", name))
    }

    fn define(&mut self, name: &str, value: Variable) -> Reply {
        if let Some(existing) = self.variables.get(name) {
            if existing.tag() != value.tag() {
                return Err(RemoteError::rpc(
                    VARIABLE_TYPE_CONFLICT,
                    format!("variable '{}' already holds a {}", name, existing.tag()),
                ));
            }
        }
        self.variables.insert(name.to_string(), value);
        Ok(Value::Null)
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Vec<[f64; 2]>, RemoteError> {
        match self.variables.get_mut(name) {
            Some(Variable::PositionCollection(items)) => Ok(items),
            Some(_) => Err(wrong_type(name, "PositionCollection")),
            None => Err(not_found("variable", name)),
        }
    }

    fn range2d_var(&self, name: &str) -> Result<([f64; 2], [f64; 2]), RemoteError> {
        match self.variable(name)? {
            Variable::Range2D { start, end } => Ok((*start, *end)),
            _ => Err(wrong_type(name, "Range2D")),
        }
    }

    fn position_var(&self, name: &str) -> Result<[f64; 2], RemoteError> {
        match self.variable(name)? {
            Variable::Position2D(p) => Ok(*p),
            _ => Err(wrong_type(name, "Position2D")),
        }
    }

    fn signal_names(&self, keep: impl Fn(&FakeSignal) -> bool) -> Vec<&str> {
        self.signals
            .iter()
            .filter(|s| keep(s))
            .map(|s| s.name.as_str())
            .collect()
    }

    fn acquire_set(&mut self, p: &Value) -> Reply {
        if self.scanning.i64_field("ScanMode") != Some(SCAN_MODE_SPOT) {
            return Err(RemoteError::rpc(
                INVALID_MODE,
                "acquiring a position set requires a setup in spot mode",
            ));
        }
        let dwell_time = number(p, "dwell_time")?;
        if dwell_time <= 0.0 {
            return Err(RemoteError::rpc(OUT_OF_RANGE, "dwell time must be positive"));
        }
        let positions = self.collection_mut(text(p, "collection")?)?.len();
        self.acquisitions += positions;
        Ok(Value::Null)
    }

    fn set_ccd_range(&mut self, p: &Value, field: &str, total: &str) -> Reply {
        let (start, end) = self.range2d_var(text(p, "range")?)?;
        if !range_within(&self.ccd[total], start, end) {
            return Err(RemoteError::rpc(
                OUT_OF_RANGE,
                format!("{} exceeds the sensor", field),
            ));
        }
        self.ccd[field] = records::range2d(start, end);
        Ok(Value::Null)
    }

    fn get_property(&self, object: &str, property: &str) -> Reply {
        let value = match (object, property) {
            (ACQUISITION_MANAGER, "IsAcquiring") => json!(self.acquiring),
            (ACQUISITION_MANAGER, "CanStart") => {
                json!(self.current_setup.is_some() && !self.acquiring)
            }
            (ACQUISITION_MANAGER, "CanStop") => json!(self.acquiring),
            (ACQUISITION_MANAGER, "IsCurrentSetup") => json!(self.current_setup.is_some()),
            (BEAM_CONTROL, "CanStart") => json!(!self.beam_scanning),
            (BEAM_CONTROL, "IsScanning") => json!(self.beam_scanning),
            (BEAM_CONTROL, _) => self.beam.get(property).cloned().unwrap_or(Value::Null),
            (SCANNING_SERVER, _) => self.scanning.get(property).cloned().unwrap_or(Value::Null),
            (CCD_SERVER, _) => self.ccd.get(property).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        };
        if value.is_null() {
            return Err(not_found(&format!("{} property", object), property));
        }
        Ok(value)
    }

    fn set_property(&mut self, object: &str, property: &str, value: Value) -> Reply {
        match object {
            SCANNING_SERVER => {
                match property {
                    "DwellTime" => check_bounds(&self.scanning, "DwellTimeRange", property, &value)?,
                    "ScanMode" => check_code(property, &value, 2)?,
                    "AcquireMode" => check_code(property, &value, 1)?,
                    _ => {}
                }
                write_field(&mut self.scanning, object, property, value)?;
                if property == "ScanMode" {
                    apply_scan_mode(&mut self.scanning);
                }
                Ok(Value::Null)
            }
            CCD_SERVER => {
                match property {
                    "IntegrationTime" => {
                        check_bounds(&self.ccd, "IntegrationTimeRange", property, &value)?
                    }
                    "AcquireMode" => check_code(property, &value, 1)?,
                    _ => {}
                }
                write_field(&mut self.ccd, object, property, value)
            }
            BEAM_CONTROL => write_field(&mut self.beam, object, property, value),
            _ => Err(RemoteError::rpc(
                REMOTE_REJECTED,
                format!("{}.{} is read-only", object, property),
            )),
        }
    }
}

/// In-memory remote with the behaviour the client relies on: name
/// resolution for windows, typed workspace variables, setups with scan
/// modes, signal links and the three acquisition servers.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the adapter owns another.
#[derive(Clone, Default)]
pub struct FakeTia {
    state: Arc<Mutex<State>>,
}

impl FakeTia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects window creation with RESOURCE_LIMIT once `limit` windows are open.
    pub fn with_window_limit(self, limit: usize) -> Self {
        self.lock().window_limit = Some(limit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        mutex_lock_or_recover(&self.state)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|(m, _)| m == method).count()
    }

    pub fn params_for(&self, method: &str) -> Vec<Option<Value>> {
        self.lock()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn method_log(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn seed_range2d(&self, name: &str, start: [f64; 2], end: [f64; 2]) {
        self.lock()
            .variables
            .insert(name.to_string(), Variable::Range2D { start, end });
    }

    pub fn seed_position2d(&self, name: &str, position: [f64; 2]) {
        self.lock()
            .variables
            .insert(name.to_string(), Variable::Position2D(position));
    }

    pub fn seed_calibration2d(&self, name: &str, offset: [f64; 2], delta: [f64; 2]) {
        let calibration = Calibration {
            offset,
            delta,
            cal_index: [0, 0],
        };
        self.lock()
            .variables
            .insert(name.to_string(), Variable::Calibration2D(calibration));
    }

    /// Adds a variable whose type the client does not model.
    pub fn insert_unknown_variable(&self, name: &str, tag: &str) {
        self.lock()
            .variables
            .insert(name.to_string(), Variable::Opaque(tag.to_string()));
    }

    /// Places a position marker on an existing display. Returns false if the
    /// display does not exist.
    pub fn seed_position_marker(&self, window: &str, display: &str, marker: &str, position: [f64; 2]) -> bool {
        let mut state = self.lock();
        let target = state
            .windows
            .get_mut(window)
            .and_then(|w| w.displays.iter_mut().find(|d| d.name == display));
        match target {
            Some(d) => {
                d.markers.insert(marker.to_string(), position);
                true
            }
            None => false,
        }
    }

    /// Simulates an operator closing a window in the remote UI.
    pub fn close_window_externally(&self, name: &str) {
        let mut state = self.lock();
        state.windows.remove(name);
        if state.active_window.as_deref() == Some(name) {
            state.active_window = None;
        }
    }

    pub fn window_names(&self) -> Vec<String> {
        self.lock().windows.keys().cloned().collect()
    }

    pub fn split_portion(&self, window: &str, display: &str) -> Option<f64> {
        self.lock()
            .windows
            .get(window)?
            .displays
            .iter()
            .find(|d| d.name == display)
            .map(|d| d.split_portion)
    }

    pub fn active_window(&self) -> Option<String> {
        self.lock().active_window.clone()
    }

    /// `(window, display, image)` the signal is routed to.
    pub fn linked_image(&self, signal: &str) -> Option<(String, String, String)> {
        self.lock()
            .links
            .get(signal)
            .map(|[w, d, i]| (w.clone(), d.clone(), i.clone()))
    }

    pub fn is_acquiring(&self) -> bool {
        self.lock().acquiring
    }

    /// Completed acquisitions; a position set counts once per position.
    pub fn acquisition_count(&self) -> usize {
        self.lock().acquisitions
    }

    pub fn scanning_field(&self, property: &str) -> Option<Value> {
        self.lock().scanning.get(property).cloned()
    }

    pub fn ccd_field(&self, property: &str) -> Option<Value> {
        self.lock().ccd.get(property).cloned()
    }
}

impl RemoteHandle for FakeTia {
    fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, RemoteError> {
        let mut state = self.lock();
        state.calls.push((method.to_string(), params.clone()));
        let params = params.unwrap_or(Value::Null);
        state.dispatch(method, &params)
    }
}

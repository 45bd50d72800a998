//! Beam-shift and direct-beam calibration artifacts.
//!
//! Files are JSON. Plotting produces named point series handed to a
//! [`PlotSink`]; drawing them is up to the sink.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Cannot read calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed calibration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Calibration has no axis '{axis}' (available: {})", .available.join(", "))]
    MissingAxis {
        axis: String,
        available: Vec<String>,
    },
}

impl CalibrationError {
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            CalibrationError::Io { .. } => {
                Some("Pass --dir or set TIA_CALIB_DIR to the directory holding the calibration files.")
            }
            CalibrationError::Parse { .. } => Some("Re-run the calibration to regenerate the file."),
            CalibrationError::MissingAxis { .. } => None,
        }
    }

    /// sysexits-style process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            CalibrationError::Io { .. } => 66,
            CalibrationError::Parse { .. } => 65,
            CalibrationError::MissingAxis { .. } => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CalibrationKind {
    BeamShift,
    DirectBeam,
}

impl CalibrationKind {
    pub fn file_name(self) -> &'static str {
        match self {
            CalibrationKind::BeamShift => "calib_beamshift.json",
            CalibrationKind::DirectBeam => "calib_directbeam.json",
        }
    }
}

pub fn calibration_path(base: &Path, kind: CalibrationKind) -> PathBuf {
    base.join(kind.file_name())
}

/// Linear map from a deflector shift to a detector pixel position, with the
/// measurements it was fitted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftCalibration {
    pub transform: [[f64; 2]; 2],
    pub reference_shift: [f64; 2],
    pub reference_pixel: [f64; 2],
    #[serde(default)]
    pub shifts: Vec<[f64; 2]>,
    #[serde(default)]
    pub pixels: Vec<[f64; 2]>,
}

impl ShiftCalibration {
    /// Pixel position predicted for a shift.
    pub fn shift_to_pixel(&self, shift: [f64; 2]) -> [f64; 2] {
        let dx = shift[0] - self.reference_shift[0];
        let dy = shift[1] - self.reference_shift[1];
        let [[a, b], [c, d]] = self.transform;
        [
            self.reference_pixel[0] + dx * a + dy * c,
            self.reference_pixel[1] + dx * b + dy * d,
        ]
    }

    fn emit(&self, prefix: Option<&str>, sink: &mut dyn PlotSink) {
        let name = |series: &str| match prefix {
            Some(p) => format!("{}/{}", p, series),
            None => series.to_string(),
        };
        let observed: Vec<(f64, f64)> = self.pixels.iter().map(|p| (p[0], p[1])).collect();
        let fitted: Vec<(f64, f64)> = self
            .shifts
            .iter()
            .map(|s| {
                let [x, y] = self.shift_to_pixel(*s);
                (x, y)
            })
            .collect();
        sink.series(&name("observed"), &observed);
        sink.series(&name("fitted"), &fitted);
    }
}

/// Direct-beam calibration: one shift calibration per deflector axis
/// (`BeamShift`, `DiffShift`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectBeamCalibration {
    pub axes: BTreeMap<String, ShiftCalibration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadedCalibration {
    BeamShift(ShiftCalibration),
    DirectBeam(DirectBeamCalibration),
}

pub fn load_calibration(
    kind: CalibrationKind,
    path: &Path,
) -> Result<LoadedCalibration, CalibrationError> {
    let text = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| CalibrationError::Parse {
        path: path.to_path_buf(),
        source,
    };
    debug!(path = %path.display(), kind = ?kind, "Loading calibration");
    match kind {
        CalibrationKind::BeamShift => serde_json::from_str(&text)
            .map(LoadedCalibration::BeamShift)
            .map_err(parse_err),
        CalibrationKind::DirectBeam => serde_json::from_str(&text)
            .map(LoadedCalibration::DirectBeam)
            .map_err(parse_err),
    }
}

/// Receives named point series for rendering.
pub trait PlotSink {
    fn series(&mut self, name: &str, points: &[(f64, f64)]);
}

/// Sink that keeps every series, in emission order.
#[derive(Debug, Default, Serialize)]
pub struct SeriesCollector {
    pub series: Vec<PlotSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl PlotSink for SeriesCollector {
    fn series(&mut self, name: &str, points: &[(f64, f64)]) {
        self.series.push(PlotSeries {
            name: name.to_string(),
            points: points.to_vec(),
        });
    }
}

/// Emits the calibration's series. `axis` selects one direct-beam axis and
/// is ignored for beam-shift calibrations.
pub fn plot(
    calibration: &LoadedCalibration,
    sink: &mut dyn PlotSink,
    axis: Option<&str>,
) -> Result<(), CalibrationError> {
    match calibration {
        LoadedCalibration::BeamShift(c) => c.emit(None, sink),
        LoadedCalibration::DirectBeam(c) => match axis {
            Some(axis) => {
                let Some(axis_calibration) = c.axes.get(axis) else {
                    return Err(CalibrationError::MissingAxis {
                        axis: axis.to_string(),
                        available: c.axes.keys().cloned().collect(),
                    });
                };
                axis_calibration.emit(Some(axis), sink);
            }
            None => {
                for (name, axis_calibration) in &c.axes {
                    axis_calibration.emit(Some(name), sink);
                }
            }
        },
    }
    Ok(())
}

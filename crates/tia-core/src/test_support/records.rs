//! Canned remote records in the remote's wire layout.

use serde_json::{Value, json};

pub fn range1d(start: f64, end: f64) -> Value {
    json!({
        "Start": start,
        "End": end,
        "Size": end - start,
        "Center": (start + end) / 2.0,
    })
}

pub fn range2d(start: [f64; 2], end: [f64; 2]) -> Value {
    json!({
        "StartX": start[0],
        "StartY": start[1],
        "EndX": end[0],
        "EndY": end[1],
        "SizeX": end[0] - start[0],
        "SizeY": end[1] - start[1],
        "Center": [(start[0] + end[0]) / 2.0, (start[1] + end[1]) / 2.0],
    })
}

pub fn calibration2d(offset: [f64; 2], delta: [f64; 2]) -> Value {
    json!({
        "OffsetX": offset[0],
        "OffsetY": offset[1],
        "DeltaX": delta[0],
        "DeltaY": delta[1],
        "CalIndexX": 0,
        "CalIndexY": 0,
    })
}

/// Camera server in continuous mode on a 2048x2048 sensor.
pub fn ccd_record() -> Value {
    let full = range2d([0.0, 0.0], [2048.0, 2048.0]);
    json!({
        "AcquireMode": 0,
        "Camera": "BM-Ceta",
        "CameraInserted": true,
        "IntegrationTime": 1.0,
        "ReadoutRange": full,
        "PixelReadoutRange": full,
        "Binning": 1,
        "ReferencePosition": [0.0, 0.0],
        "ReadoutRate": 1.0,
        "DriftRateX": 0.0,
        "DriftRateY": 0.0,
        "BiasCorrection": true,
        "GainCorrection": true,
        "SeriesSize": 1,
        "IntegrationTimeRange": range1d(0.001, 10.0),
        "TotalReadoutRange": full,
        "TotalPixelReadoutRange": full,
    })
}

/// Scanning server in frame mode over the normalized field of view.
pub fn scanning_record() -> Value {
    let field = range2d([-1.0, -1.0], [1.0, 1.0]);
    json!({
        "AcquireMode": 0,
        "FrameWidth": 512,
        "FrameHeight": 512,
        "DwellTime": 1e-5,
        "ScanResolution": 1.0,
        "ScanMode": 2,
        "ForceExternalScan": false,
        "ReferencePosition": [0.0, 0.0],
        "BeamPosition": [0.0, 0.0],
        "DriftRateX": 0.0,
        "DriftRateY": 0.0,
        "ScanRange": field,
        "SeriesSize": 1,
        "DwellTimeRange": range1d(1e-6, 1e-2),
        "TotalScanRange": field,
        "ScanResolutionRange": range1d(0.1, 1.0),
    })
}

pub fn beam_record() -> Value {
    json!({ "DwellTime": 0.001, "PositionCalibrated": false })
}

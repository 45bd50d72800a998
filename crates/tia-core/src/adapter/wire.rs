//! Remote record layouts. Field names follow the remote's PascalCase.

use serde::Deserialize;

use crate::data2d::ImageMetadata;
use crate::error::Result;
use crate::modes::{AcquireMode, ScanMode};
use crate::servers::{BeamState, CcdAllowedRanges, CcdState, ScanningAllowedRanges, ScanningState};
use crate::values::{Calibration2D, Position2D, Range1D, Range2D};

/// Positions arrive as `[x, y]`; older servers send `{"X": .., "Y": ..}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub(crate) enum PositionRecord {
    Pair([f64; 2]),
    #[serde(rename_all = "PascalCase")]
    Fields { x: f64, y: f64 },
}

impl From<PositionRecord> for Position2D {
    fn from(record: PositionRecord) -> Self {
        match record {
            PositionRecord::Pair([x, y]) => Position2D::new(x, y),
            PositionRecord::Fields { x, y } => Position2D::new(x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Calibration2DRecord {
    offset_x: f64,
    offset_y: f64,
    delta_x: f64,
    delta_y: f64,
    #[serde(default)]
    cal_index_x: i32,
    #[serde(default)]
    cal_index_y: i32,
}

impl From<Calibration2DRecord> for Calibration2D {
    fn from(r: Calibration2DRecord) -> Self {
        Calibration2D::new(r.offset_x, r.offset_y, r.delta_x, r.delta_y)
            .with_cal_indices(r.cal_index_x, r.cal_index_y)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Range2DRecord {
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    size_x: f64,
    size_y: f64,
    center: PositionRecord,
}

impl From<Range2DRecord> for Range2D {
    fn from(r: Range2DRecord) -> Self {
        Range2D::from_remote(
            Position2D::new(r.start_x, r.start_y),
            Position2D::new(r.end_x, r.end_y),
            r.size_x,
            r.size_y,
            r.center.into(),
        )
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Range1DRecord {
    start: f64,
    end: f64,
    size: f64,
    center: f64,
}

impl From<Range1DRecord> for Range1D {
    fn from(r: Range1DRecord) -> Self {
        Range1D::from_remote(r.start, r.end, r.size, r.center)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PositionCollectionRecord {
    #[serde(default)]
    items: Vec<PositionRecord>,
}

impl PositionCollectionRecord {
    pub(crate) fn into_positions(self) -> Vec<Position2D> {
        self.items.into_iter().map(Position2D::from).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ObjectNamesRecord {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, alias = "Position Markers")]
    pub position_markers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ImageRecord {
    calibration: Calibration2DRecord,
    range: Range2DRecord,
    pixels_x: u32,
    pixels_y: u32,
}

impl From<ImageRecord> for ImageMetadata {
    fn from(r: ImageRecord) -> Self {
        ImageMetadata {
            calibration: r.calibration.into(),
            range: r.range.into(),
            size_x: r.pixels_x,
            size_y: r.pixels_y,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CcdRecord {
    acquire_mode: i64,
    camera: String,
    camera_inserted: bool,
    integration_time: f64,
    readout_range: Range2DRecord,
    pixel_readout_range: Range2DRecord,
    binning: i64,
    reference_position: PositionRecord,
    readout_rate: f64,
    drift_rate_x: f64,
    drift_rate_y: f64,
    bias_correction: bool,
    gain_correction: bool,
    series_size: i64,
    integration_time_range: Range1DRecord,
    total_readout_range: Range2DRecord,
    total_pixel_readout_range: Range2DRecord,
}

impl CcdRecord {
    pub(crate) fn into_state(self) -> Result<CcdState> {
        Ok(CcdState {
            acquire_mode: AcquireMode::from_code(self.acquire_mode)?,
            camera: self.camera,
            camera_inserted: self.camera_inserted,
            integration_time: self.integration_time,
            readout_range: self.readout_range.into(),
            pixel_readout_range: self.pixel_readout_range.into(),
            binning: self.binning,
            reference_position: self.reference_position.into(),
            readout_rate: self.readout_rate,
            drift_rate: Position2D::new(self.drift_rate_x, self.drift_rate_y),
            bias_correction: self.bias_correction,
            gain_correction: self.gain_correction,
            series_size: self.series_size,
            allowed: CcdAllowedRanges {
                integration_time: self.integration_time_range.into(),
                readout_range: self.total_readout_range.into(),
                pixel_readout_range: self.total_pixel_readout_range.into(),
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ScanningRecord {
    acquire_mode: i64,
    frame_width: u32,
    frame_height: u32,
    dwell_time: f64,
    scan_resolution: f64,
    scan_mode: i64,
    force_external_scan: bool,
    reference_position: PositionRecord,
    beam_position: PositionRecord,
    drift_rate_x: f64,
    drift_rate_y: f64,
    scan_range: Range2DRecord,
    series_size: i64,
    dwell_time_range: Range1DRecord,
    total_scan_range: Range2DRecord,
    #[serde(default)]
    scan_resolution_range: Option<Range1DRecord>,
}

impl ScanningRecord {
    pub(crate) fn into_state(self) -> Result<ScanningState> {
        Ok(ScanningState {
            acquire_mode: AcquireMode::from_code(self.acquire_mode)?,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            dwell_time: self.dwell_time,
            scan_resolution: self.scan_resolution,
            scan_mode: ScanMode::from_code(self.scan_mode)?,
            force_external_scan: self.force_external_scan,
            reference_position: self.reference_position.into(),
            beam_position: self.beam_position.into(),
            drift_rate: Position2D::new(self.drift_rate_x, self.drift_rate_y),
            scan_range: self.scan_range.into(),
            series_size: self.series_size,
            allowed: ScanningAllowedRanges {
                dwell_time: self.dwell_time_range.into(),
                scan_range: self.total_scan_range.into(),
                scan_resolution: self.scan_resolution_range.map(Range1D::from),
            },
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BeamRecord {
    dwell_time: f64,
    position_calibrated: bool,
}

impl From<BeamRecord> for BeamState {
    fn from(r: BeamRecord) -> Self {
        BeamState {
            dwell_time: r.dwell_time,
            position_calibrated: r.position_calibrated,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_position_accepts_pair_and_fields() {
        let pair: PositionRecord = serde_json::from_value(json!([1.0, 2.0])).unwrap();
        let fields: PositionRecord = serde_json::from_value(json!({"X": 1.0, "Y": 2.0})).unwrap();
        assert_eq!(Position2D::from(pair), Position2D::new(1.0, 2.0));
        assert_eq!(Position2D::from(fields), Position2D::new(1.0, 2.0));
    }

    #[test]
    fn test_range2d_keeps_remote_derived_fields() {
        let record: Range2DRecord = serde_json::from_value(json!({
            "StartX": 0.0, "StartY": 0.0, "EndX": 10.0, "EndY": 6.0,
            "SizeX": 10.0, "SizeY": 6.0, "Center": [5.0, 3.0]
        }))
        .unwrap();
        let range = Range2D::from(record);
        assert_eq!(range.size(), (10.0, 6.0));
        assert_eq!(range.center(), Position2D::new(5.0, 3.0));
    }

    #[test]
    fn test_calibration_indices_default_to_zero() {
        let record: Calibration2DRecord = serde_json::from_value(json!({
            "OffsetX": 1.0, "OffsetY": 2.0, "DeltaX": 0.5, "DeltaY": 0.25
        }))
        .unwrap();
        let calibration = Calibration2D::from(record);
        assert_eq!(calibration.cal_index_x, 0);
        assert_eq!(calibration.delta_y, 0.25);
    }

    #[test]
    fn test_object_names_accepts_spaced_marker_key() {
        let record: ObjectNamesRecord = serde_json::from_value(json!({
            "Images": ["img"], "Position Markers": ["m1"]
        }))
        .unwrap();
        assert_eq!(record.position_markers, vec!["m1".to_string()]);
    }

    #[test]
    fn test_unmapped_scan_mode_is_invalid_enum() {
        let mut record = crate::test_support::records::scanning_record();
        record["ScanMode"] = json!(7);
        let record: ScanningRecord = serde_json::from_value(record).unwrap();
        assert!(matches!(
            record.into_state(),
            Err(crate::error::TiaError::InvalidEnumValue { field: "scan_mode", .. })
        ));
    }
}

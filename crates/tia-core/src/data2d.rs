//! Image data and the per-pixel physical position grid.
//!
//! The remote enumerates pixels from the bottom-left corner with X along
//! columns and Y along rows. The grid here is consumed as `(row, column)`,
//! so the column index walks X and the row index walks Y.

use serde::Serialize;

use crate::error::{Result, TiaError};
use crate::values::{Calibration2D, Position2D, Range2D};

/// Row-major pixel values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ImageArray {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl ImageArray {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(TiaError::malformed("GetImageArray", "ragged image rows"));
        }
        let n_rows = rows.len();
        Ok(Self {
            rows: n_rows,
            cols,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Longest axis a grid derived from range and calibration alone may have.
const MAX_AXIS_LEN: f64 = 1_048_576.0;

/// Lower-left pixel boundaries, `start, start + delta, ...` strictly below `end`.
fn axis(start: f64, end: f64, delta: f64, name: &str) -> Result<Vec<f64>> {
    let steps = ((end - start) / delta).ceil();
    if !steps.is_finite() || steps <= 0.0 {
        return Ok(Vec::new());
    }
    if steps > MAX_AXIS_LEN {
        return Err(TiaError::malformed(
            "GetImage",
            format!("image '{}' spans {} pixels along one axis", name, steps),
        ));
    }
    Ok(sized_axis(start, delta, steps as usize))
}

fn sized_axis(start: f64, delta: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| start + i as f64 * delta).collect()
}

/// Physical position of every pixel's lower-left corner.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PixelGrid {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl PixelGrid {
    pub fn new(range: &Range2D, calibration: &Calibration2D, name: &str) -> Result<Self> {
        calibration.ensure_bindable(name)?;
        let (start, end) = (range.start(), range.end());
        Ok(Self {
            xs: axis(start.x, end.x, calibration.delta_x, name)?,
            ys: axis(start.y, end.y, calibration.delta_y, name)?,
        })
    }

    /// Grid of exactly `size_x` columns by `size_y` rows starting at the
    /// range's lower-left corner.
    pub fn with_size(
        range: &Range2D,
        calibration: &Calibration2D,
        size_x: u32,
        size_y: u32,
        name: &str,
    ) -> Result<Self> {
        calibration.ensure_bindable(name)?;
        let start = range.start();
        Ok(Self {
            xs: sized_axis(start.x, calibration.delta_x, size_x as usize),
            ys: sized_axis(start.y, calibration.delta_y, size_y as usize),
        })
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.ys.len(), self.xs.len())
    }

    pub fn at(&self, row: usize, col: usize) -> Option<Position2D> {
        let x = self.xs.get(col)?;
        let y = self.ys.get(row)?;
        Some(Position2D::new(*x, *y))
    }

    pub fn x_axis(&self) -> &[f64] {
        &self.xs
    }

    pub fn y_axis(&self) -> &[f64] {
        &self.ys
    }
}

/// Image metadata as reported by the remote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageMetadata {
    pub calibration: Calibration2D,
    pub range: Range2D,
    pub size_x: u32,
    pub size_y: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Data2D {
    pub value: ImageArray,
    pub size_x: u32,
    pub size_y: u32,
    pub calibration: Calibration2D,
    pub range: Range2D,
    pub pixel_position: PixelGrid,
}

impl Data2D {
    /// The pixel grid follows the reported `PixelsX`/`PixelsY`, which must
    /// match the array's shape.
    pub fn new(name: &str, metadata: ImageMetadata, value: ImageArray) -> Result<Self> {
        let expected = (metadata.size_y as usize, metadata.size_x as usize);
        let no_pixels = expected.0 == 0 || expected.1 == 0;
        if value.shape() != expected && !(value.is_empty() && no_pixels) {
            return Err(TiaError::malformed(
                "GetImageArray",
                format!(
                    "image '{}' has {}x{} values but reports {}x{} pixels",
                    name,
                    value.shape().1,
                    value.shape().0,
                    metadata.size_x,
                    metadata.size_y
                ),
            ));
        }
        let pixel_position = PixelGrid::with_size(
            &metadata.range,
            &metadata.calibration,
            metadata.size_x,
            metadata.size_y,
            name,
        )?;
        Ok(Self {
            value,
            size_x: metadata.size_x,
            size_y: metadata.size_y,
            calibration: metadata.calibration,
            range: metadata.range,
            pixel_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid() -> PixelGrid {
        let range = Range2D::new(Position2D::new(0.0, 0.0), Position2D::new(3.0, 3.0)).unwrap();
        let calibration = Calibration2D::new(0.0, 0.0, 1.0, 1.0);
        PixelGrid::new(&range, &calibration, "img").unwrap()
    }

    #[test]
    fn test_pixel_grid_origin() {
        let grid = unit_grid();
        assert_eq!(grid.shape(), (3, 3));
        assert_eq!(grid.at(0, 0), Some(Position2D::new(0.0, 0.0)));
    }

    #[test]
    fn test_pixel_grid_column_advances_first_component() {
        let grid = unit_grid();
        assert_eq!(grid.at(0, 1), Some(Position2D::new(1.0, 0.0)));
        assert_eq!(grid.at(0, 2), Some(Position2D::new(2.0, 0.0)));
    }

    #[test]
    fn test_pixel_grid_row_advances_second_component() {
        let grid = unit_grid();
        assert_eq!(grid.at(1, 0), Some(Position2D::new(0.0, 1.0)));
        assert_eq!(grid.at(2, 1), Some(Position2D::new(1.0, 2.0)));
        assert_eq!(grid.at(3, 0), None);
    }

    #[test]
    fn test_pixel_grid_non_square() {
        let range = Range2D::new(Position2D::new(0.0, 10.0), Position2D::new(4.0, 12.0)).unwrap();
        let calibration = Calibration2D::new(0.0, 10.0, 2.0, 0.5);
        let grid = PixelGrid::new(&range, &calibration, "img").unwrap();
        assert_eq!(grid.shape(), (4, 2));
        assert_eq!(grid.at(3, 1), Some(Position2D::new(2.0, 11.5)));
    }

    #[test]
    fn test_pixel_grid_rejects_zero_delta() {
        let range = Range2D::new(Position2D::new(0.0, 0.0), Position2D::new(3.0, 3.0)).unwrap();
        let calibration = Calibration2D::new(0.0, 0.0, 1.0, 0.0);
        assert!(matches!(
            PixelGrid::new(&range, &calibration, "img"),
            Err(TiaError::DegenerateCalibration { .. })
        ));
    }

    #[test]
    fn test_axis_partial_step_is_included() {
        assert_eq!(axis(0.0, 2.5, 1.0, "img").unwrap(), vec![0.0, 1.0, 2.0]);
        assert!(axis(0.0, 0.0, 1.0, "img").unwrap().is_empty());
        assert!(axis(0.0, 3.0, -1.0, "img").unwrap().is_empty());
    }

    #[test]
    fn test_pixel_grid_rejects_tiny_delta() {
        let range = Range2D::new(Position2D::new(0.0, 0.0), Position2D::new(1.0, 1.0)).unwrap();
        for delta in [1e-300, 1e-9] {
            let calibration = Calibration2D::new(0.0, 0.0, delta, 1.0);
            assert!(matches!(
                PixelGrid::new(&range, &calibration, "img"),
                Err(TiaError::MalformedRecord { .. })
            ));
        }
    }

    fn metadata(delta: f64, size_x: u32, size_y: u32) -> ImageMetadata {
        ImageMetadata {
            calibration: Calibration2D::new(0.0, 0.0, delta, delta),
            range: Range2D::new(Position2D::new(0.0, 0.0), Position2D::new(1.0, 1.0)).unwrap(),
            size_x,
            size_y,
        }
    }

    #[test]
    fn test_data2d_grid_follows_reported_pixels() {
        let value = ImageArray::from_rows(vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]).unwrap();
        let data = Data2D::new("img", metadata(1e-300, 3, 2), value).unwrap();
        assert_eq!(data.pixel_position.shape(), (2, 3));
        assert_eq!(data.pixel_position.at(1, 2), Some(Position2D::new(2e-300, 1e-300)));
    }

    #[test]
    fn test_data2d_rejects_shape_mismatch() {
        let value = ImageArray::from_rows(vec![vec![0.0, 1.0], vec![2.0, 3.0]]).unwrap();
        let err = Data2D::new("img", metadata(0.5, 4_000_000_000, 2), value).unwrap_err();
        assert!(matches!(err, TiaError::MalformedRecord { .. }));
    }

    #[test]
    fn test_image_array_row_major() {
        let array = ImageArray::from_rows(vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]).unwrap();
        assert_eq!(array.shape(), (2, 3));
        assert_eq!(array.get(1, 0), Some(3.0));
        assert_eq!(array.get(0, 2), Some(2.0));
        assert_eq!(array.get(2, 0), None);
    }

    #[test]
    fn test_image_array_rejects_ragged_rows() {
        let err = ImageArray::from_rows(vec![vec![0.0, 1.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, TiaError::MalformedRecord { .. }));
    }
}

//! Regular 2D grids and tiling helpers for the raster drivers.
//!
//! A [`Grid2D`] is `u_count` x `v_count` cells anchored at `origin` and
//! rotated counter-clockwise about it. Values are stored u-fastest: the
//! value of cell `(u, v)` sits at `u + v * u_count`.

use geo::AffineTransform;
use serde::{Deserialize, Serialize};

use crate::types::{CurveError, Point, check_length};

/// Serde support for `Vec<f64>` with `NaN` written as `null`.
///
/// JSON has no `NaN`; missing grid values travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize, writing `NaN` as `null`.
    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let options: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        options.serialize(serializer)
    }

    /// Deserialize, reading `null` as `NaN`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let options = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(options.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// Geometry of a regular, optionally rotated, 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    /// Corner of the first cell.
    pub origin: Point,
    /// Cell size along u.
    pub u_cell_size: f64,
    /// Cell size along v.
    pub v_cell_size: f64,
    /// Number of cells along u.
    pub u_count: u32,
    /// Number of cells along v.
    pub v_count: u32,
    /// Rotation in degrees, counter-clockwise about `origin`.
    #[serde(default)]
    pub rotation: f64,
}

impl Grid2D {
    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.u_count as usize * self.v_count as usize
    }

    /// Check the grid invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] for an empty grid or a zero
    /// or non-finite cell size, origin or rotation.
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.u_count == 0 || self.v_count == 0 {
            return Err(CurveError::InvalidConfig(format!(
                "grid must have at least one cell, got {}x{}",
                self.u_count, self.v_count
            )));
        }
        let sizes_ok = [self.u_cell_size, self.v_cell_size]
            .iter()
            .all(|s| s.is_finite() && *s != 0.0);
        if !sizes_ok || !self.origin.is_finite() || !self.rotation.is_finite() {
            return Err(CurveError::InvalidConfig(
                "grid cell sizes must be non-zero and all grid parameters finite".to_string(),
            ));
        }
        Ok(())
    }

    /// World coordinates of the center of cell `(u, v)`.
    ///
    /// Fractional indices are allowed.
    #[must_use]
    pub fn cell_center(&self, u: f64, v: f64) -> Point {
        let local = geo::Coord {
            x: (u + 0.5).mul_add(self.u_cell_size, self.origin.x),
            y: (v + 0.5).mul_add(self.v_cell_size, self.origin.y),
        };
        if self.rotation == 0.0 {
            return Point::new(local.x, local.y);
        }
        let rotated = AffineTransform::rotate(self.rotation, point_to_coord(self.origin))
            .apply(local);
        Point::new(rotated.x, rotated.y)
    }

    /// Index into a u-fastest value array.
    #[must_use]
    pub fn value_index(&self, u: u32, v: u32) -> usize {
        u as usize + v as usize * self.u_count as usize
    }
}

const fn point_to_coord(p: Point) -> geo::Coord<f64> {
    geo::Coord { x: p.x, y: p.y }
}

/// Values sampled on a [`Grid2D`]; `NaN` marks missing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridData {
    /// Grid geometry.
    pub grid: Grid2D,
    /// One value per cell, u-fastest.
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
}

impl GridData {
    /// Pair a grid with its values.
    ///
    /// # Errors
    ///
    /// See [`GridData::validate`].
    pub fn new(grid: Grid2D, values: Vec<f64>) -> Result<Self, CurveError> {
        let data = Self { grid, values };
        data.validate()?;
        Ok(data)
    }

    /// Check the grid and that there is one value per cell.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] for an invalid grid or
    /// [`CurveError::LengthMismatch`] for a wrong number of values.
    pub fn validate(&self) -> Result<(), CurveError> {
        self.grid.validate()?;
        check_length("grid values", self.grid.cell_count(), self.values.len())
    }

    /// Value of cell `(u, v)`.
    #[must_use]
    pub fn value(&self, u: u32, v: u32) -> f64 {
        self.values[self.grid.value_index(u, v)]
    }

    /// Minimum and maximum of the finite values, if any.
    #[must_use]
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |range, &v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }
}

/// Bounds `(start, end)` of tiles of `width` covering `0..size`.
///
/// Tiles are spread evenly with the first starting at 0 and the last
/// ending at `size`, using as few tiles as keep consecutive tiles
/// overlapping by at least a quarter of `width`. A `width` of at least
/// `size` gives a single tile.
#[must_use]
pub fn overlapping_limits(size: u32, width: u32) -> Vec<(u32, u32)> {
    if width == 0 || width >= size {
        return vec![(0, size)];
    }
    let span = f64::from(size - width);
    let width_f = f64::from(width);

    let mut count = 2_u32;
    while width_f - span / f64::from(count - 1) < 0.25 * width_f {
        count += 1;
    }

    (0..count)
        .map(|k| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let start = (span * f64::from(k) / f64::from(count - 1)).round() as u32;
            (start, start + width)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn grid(u_count: u32, v_count: u32) -> Grid2D {
        Grid2D {
            origin: Point::new(100.0, 200.0),
            u_cell_size: 10.0,
            v_cell_size: 5.0,
            u_count,
            v_count,
            rotation: 0.0,
        }
    }

    #[test]
    fn cell_centers_unrotated() {
        let g = grid(4, 3);
        assert_eq!(g.cell_center(0.0, 0.0), Point::new(105.0, 202.5));
        assert_eq!(g.cell_center(3.0, 2.0), Point::new(135.0, 212.5));
    }

    #[test]
    fn cell_centers_rotated_quarter_turn() {
        let g = Grid2D {
            origin: Point::new(0.0, 0.0),
            u_cell_size: 2.0,
            v_cell_size: 2.0,
            rotation: 90.0,
            ..grid(2, 2)
        };
        let c = g.cell_center(0.0, 0.0);
        // (1, 1) rotated 90 degrees counter-clockwise is (-1, 1).
        assert!((c.x + 1.0).abs() < 1e-9);
        assert!((c.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn grid_validation() {
        assert!(grid(2, 2).validate().is_ok());
        assert!(grid(0, 2).validate().is_err());
        let bad = Grid2D {
            u_cell_size: 0.0,
            ..grid(2, 2)
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn grid_data_length_checked() {
        assert!(GridData::new(grid(2, 2), vec![0.0; 4]).is_ok());
        assert!(matches!(
            GridData::new(grid(2, 2), vec![0.0; 3]),
            Err(CurveError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn value_indexing_is_u_fastest() {
        let data = GridData::new(grid(3, 2), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((data.value(2, 0) - 2.0).abs() < f64::EPSILON);
        assert!((data.value(0, 1) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn finite_range_ignores_nan() {
        let data = GridData::new(grid(2, 2), vec![f64::NAN, 3.0, -1.0, f64::NAN]).unwrap();
        assert_eq!(data.finite_range(), Some((-1.0, 3.0)));
        let empty = GridData::new(grid(1, 1), vec![f64::NAN]).unwrap();
        assert_eq!(empty.finite_range(), None);
    }

    #[test]
    fn nan_round_trips_as_null() {
        let data = GridData::new(grid(2, 1), vec![1.5, f64::NAN]).unwrap();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("[1.5,null]"));
        let back: GridData = serde_json::from_str(&json).unwrap();
        assert!((back.values[0] - 1.5).abs() < f64::EPSILON);
        assert!(back.values[1].is_nan());
    }

    #[test]
    fn single_tile_when_window_covers_size() {
        assert_eq!(overlapping_limits(50, 50), vec![(0, 50)]);
        assert_eq!(overlapping_limits(50, 80), vec![(0, 50)]);
    }

    #[test]
    fn tiles_cover_and_overlap() {
        for (size, width) in [(100, 40), (256, 64), (101, 30), (10, 9)] {
            let limits = overlapping_limits(size, width);
            assert_eq!(limits.first().unwrap().0, 0);
            assert_eq!(limits.last().unwrap().1, size);
            for pair in limits.windows(2) {
                let overlap = pair[0].1 - pair[1].0;
                assert!(
                    4 * overlap + 4 >= width,
                    "overlap {overlap} too small for width {width}"
                );
            }
        }
    }

    #[test]
    fn two_tiles_when_enough() {
        // 100 wide, 60 per tile: two tiles overlap by 20 >= 15.
        assert_eq!(overlapping_limits(100, 60), vec![(0, 60), (40, 100)]);
    }
}

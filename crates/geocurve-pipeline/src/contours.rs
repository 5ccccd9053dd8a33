//! Iso-value contours of gridded data.
//!
//! Values are sampled at cell centers. For each requested level the grid
//! is scanned with marching squares: every square of four neighbouring
//! centers that straddles the level contributes one or two segments whose
//! endpoints are linearly interpolated along the square's sides. Segments
//! sharing a crossing are then chained into polylines, open where the
//! iso-line leaves the data and closed where it loops.
//!
//! # Strategy pattern
//!
//! Tracing sits behind the [`ContourTracer`] trait so another algorithm
//! can be added as a new [`ContourTracerKind`] variant without changing
//! the driver.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::ContourConfig;
use crate::grid::GridData;
use crate::types::{CurveError, CurveSet, DataValues, Point, Polyline, cell_index};

/// Name of the per-vertex contour level array.
pub const LEVEL_DATA: &str = "level";

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourTracerKind {
    /// Marching squares with linear interpolation; values below the level
    /// are fully connected at saddles.
    #[default]
    MarchingSquares,
}

/// Trait for contour tracing strategies.
///
/// Output polylines are in fractional cell indices `(u, v)`, with cell
/// centers at whole numbers. A closed line repeats its first point at the
/// end.
pub trait ContourTracer {
    /// Trace the iso-lines of `source` at `level`.
    fn trace(&self, source: &GridData, level: f64) -> Vec<Polyline>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, source: &GridData, level: f64) -> Vec<Polyline> {
        match *self {
            Self::MarchingSquares => trace_marching_squares(source, level),
        }
    }
}

/// The side of a square an iso-line crosses, named by its lower corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Crossing {
    /// Between `(u, v)` and `(u + 1, v)`.
    AlongU { u: u32, v: u32 },
    /// Between `(u, v)` and `(u, v + 1)`.
    AlongV { u: u32, v: u32 },
}

impl Crossing {
    /// Interpolated position of the level on this side.
    fn locate(self, source: &GridData, level: f64) -> Point {
        let (u, v, du, dv) = match self {
            Self::AlongU { u, v } => (u, v, 1, 0),
            Self::AlongV { u, v } => (u, v, 0, 1),
        };
        let a = source.value(u, v);
        let b = source.value(u + du, v + dv);
        // Only sides with one end on each side of the level are crossed,
        // so `a != b`.
        let t = ((level - a) / (b - a)).clamp(0.0, 1.0);
        Point::new(
            t.mul_add(f64::from(du), f64::from(u)),
            t.mul_add(f64::from(dv), f64::from(v)),
        )
    }
}

/// Segments of one square, by the corners at or above the level.
///
/// Corner bits: 1 = `(u, v)`, 2 = `(u + 1, v)`, 4 = `(u + 1, v + 1)`,
/// 8 = `(u, v + 1)`. At saddles (5 and 10) the corners above the level
/// are cut off individually.
fn square_segments(case: u8, u: u32, v: u32) -> Vec<[Crossing; 2]> {
    let low = Crossing::AlongU { u, v };
    let high = Crossing::AlongU { u, v: v + 1 };
    let left = Crossing::AlongV { u, v };
    let right = Crossing::AlongV { u: u + 1, v };
    match case {
        1 | 14 => vec![[left, low]],
        2 | 13 => vec![[low, right]],
        3 | 12 => vec![[left, right]],
        4 | 11 => vec![[right, high]],
        5 => vec![[left, low], [right, high]],
        6 | 9 => vec![[low, high]],
        7 | 8 => vec![[left, high]],
        10 => vec![[low, right], [left, high]],
        _ => Vec::new(),
    }
}

fn trace_marching_squares(source: &GridData, level: f64) -> Vec<Polyline> {
    let grid = &source.grid;
    if grid.u_count < 2 || grid.v_count < 2 {
        return Vec::new();
    }

    let mut segments: Vec<[Crossing; 2]> = Vec::new();
    for v in 0..grid.v_count - 1 {
        for u in 0..grid.u_count - 1 {
            let corners = [
                source.value(u, v),
                source.value(u + 1, v),
                source.value(u + 1, v + 1),
                source.value(u, v + 1),
            ];
            // Squares touching missing data are skipped.
            if corners.iter().any(|c| !c.is_finite()) {
                continue;
            }
            let case = corners
                .iter()
                .enumerate()
                .filter(|(_, c)| **c >= level)
                .fold(0_u8, |case, (bit, _)| case | (1 << bit));
            segments.extend(square_segments(case, u, v));
        }
    }

    chain_segments(&segments)
        .into_iter()
        .map(|chain| {
            Polyline::new(
                chain
                    .into_iter()
                    .map(|crossing| crossing.locate(source, level))
                    .collect(),
            )
        })
        .collect()
}

/// Join segments that share a crossing into chains.
///
/// Open chains are started from their ends first, in crossing order;
/// whatever remains forms loops, which end on their first crossing.
fn chain_segments(segments: &[[Crossing; 2]]) -> Vec<Vec<Crossing>> {
    // Each side borders at most two squares, so at most two segments.
    let mut incident: BTreeMap<Crossing, Vec<usize>> = BTreeMap::new();
    for (index, segment) in segments.iter().enumerate() {
        for &crossing in segment {
            incident.entry(crossing).or_default().push(index);
        }
    }

    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();
    let follow = |start: Crossing, first: usize, used: &mut [bool]| {
        let mut chain = vec![start];
        let mut at = start;
        let mut segment = first;
        loop {
            used[segment] = true;
            let [a, b] = segments[segment];
            at = if a == at { b } else { a };
            chain.push(at);
            let next = incident
                .get(&at)
                .and_then(|list| list.iter().copied().find(|&s| !used[s]));
            match next {
                Some(s) => segment = s,
                None => break,
            }
        }
        chain
    };

    let ends: Vec<(Crossing, usize)> = incident
        .iter()
        .filter(|(_, list)| list.len() == 1)
        .map(|(&crossing, list)| (crossing, list[0]))
        .collect();
    for (crossing, segment) in ends {
        if !used[segment] {
            chains.push(follow(crossing, segment, &mut used[..]));
        }
    }
    for segment in 0..segments.len() {
        if !used[segment] {
            chains.push(follow(segments[segment][0], segment, &mut used[..]));
        }
    }
    chains
}

/// Trace contours at every configured level.
///
/// The result may be empty; levels outside the data range produce no
/// line. Closed lines get a closing cell instead of a repeated vertex.
///
/// # Errors
///
/// Returns [`CurveError::InvalidConfig`] for an invalid grid or
/// configuration, [`CurveError::LengthMismatch`] if the values do not
/// fill the grid, and [`CurveError::IndexOverflow`] for oversized output.
pub fn trace_contours(
    source: &GridData,
    config: &ContourConfig,
    tracer: &impl ContourTracer,
) -> Result<CurveSet, CurveError> {
    source.validate()?;
    config.validate()?;

    let mut vertices: Vec<Point> = Vec::new();
    let mut cells: Vec<[u32; 2]> = Vec::new();
    let mut levels: Vec<f64> = Vec::new();

    for level in config.levels() {
        let lines = tracer.trace(source, level);
        debug!("level {level}: {} lines", lines.len());

        for line in lines {
            let closed = line.len() > 2 && line.first() == line.last();
            let mut points = line.into_points();
            if closed {
                points.pop();
            }

            let first = vertices.len();
            let count = points.len();
            vertices.extend(points.iter().map(|p| source.grid.cell_center(p.x, p.y)));
            levels.extend(std::iter::repeat_n(level, count));
            for k in 1..count {
                cells.push([cell_index(first + k - 1)?, cell_index(first + k)?]);
            }
            if closed {
                cells.push([cell_index(first + count - 1)?, cell_index(first)?]);
            }
        }
    }

    CurveSet::new(vertices, cells)?.with_data(LEVEL_DATA, DataValues::Float(levels))
}

/// [`trace_contours`] with marching squares, failing when nothing is found.
///
/// # Errors
///
/// Returns [`CurveError::NoContours`] when no level produced a contour,
/// plus the errors of [`trace_contours`].
pub fn detect_contours(source: &GridData, config: &ContourConfig) -> Result<CurveSet, CurveError> {
    let set = trace_contours(source, config, &ContourTracerKind::default())?;
    if set.cell_count() == 0 {
        return Err(CurveError::NoContours);
    }
    info!(
        "contours: {} segments over {} vertices",
        set.cell_count(),
        set.vertex_count()
    );
    Ok(set)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::Grid2D;

    fn unit_grid(u_count: u32, v_count: u32) -> Grid2D {
        Grid2D {
            origin: Point::new(0.0, 0.0),
            u_cell_size: 1.0,
            v_cell_size: 1.0,
            u_count,
            v_count,
            rotation: 0.0,
        }
    }

    /// Values equal to the u index.
    fn ramp(u_count: u32, v_count: u32) -> GridData {
        let grid = unit_grid(u_count, v_count);
        let values = (0..v_count)
            .flat_map(|_| (0..u_count).map(f64::from))
            .collect();
        GridData::new(grid, values).unwrap()
    }

    /// Cone peaking at the grid center.
    fn cone(size: u32) -> GridData {
        let center = f64::from(size - 1) / 2.0;
        let mut values = Vec::new();
        for v in 0..size {
            for u in 0..size {
                let d = (f64::from(u) - center).hypot(f64::from(v) - center);
                values.push(100.0 - d);
            }
        }
        GridData::new(unit_grid(size, size), values).unwrap()
    }

    fn levels(fixed: Vec<f64>) -> ContourConfig {
        ContourConfig {
            fixed_contours: fixed,
            ..ContourConfig::default()
        }
    }

    #[test]
    fn default_is_marching_squares() {
        assert_eq!(
            ContourTracerKind::default(),
            ContourTracerKind::MarchingSquares
        );
    }

    #[test]
    fn flat_grid_has_no_lines() {
        let source = GridData::new(unit_grid(5, 5), vec![3.0; 25]).unwrap();
        assert!(ContourTracerKind::MarchingSquares.trace(&source, 3.5).is_empty());
    }

    #[test]
    fn ramp_line_sits_at_interpolated_level() {
        // Cell centers are at x = u + 0.5, so level 2.5 lies at x = 3.
        let set = detect_contours(&ramp(6, 4), &levels(vec![2.5])).unwrap();
        assert_eq!(set.vertex_count(), 4);
        // Open: it runs from one grid side to the other.
        assert_eq!(set.cell_count(), 3);
        for p in &set.vertices {
            assert!((p.x - 3.0).abs() < 1e-12, "x = {}", p.x);
        }
        let mut ys: Vec<f64> = set.vertices.iter().map(|p| p.y).collect();
        ys.sort_by(f64::total_cmp);
        assert_eq!(ys, vec![0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn ramp_line_is_one_chain() {
        let lines = ContourTracerKind::MarchingSquares.trace(&ramp(6, 4), 1.25);
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].is_empty());
        assert_ne!(lines[0].first(), lines[0].last());
        for p in lines[0].points() {
            assert!((p.x - 1.25).abs() < 1e-12);
        }
    }

    #[test]
    fn cone_gives_closed_ring() {
        let source = cone(21);
        let set = detect_contours(&source, &levels(vec![95.0])).unwrap();
        assert!(set.vertex_count() >= 8);
        // Closed: one cell per vertex.
        assert_eq!(set.cell_count(), set.vertex_count());
        // Interpolated crossings lie on (or just inside) the radius-5
        // circle around the peak at (10.5, 10.5).
        for p in &set.vertices {
            let r = (p.x - 10.5).hypot(p.y - 10.5);
            assert!((4.8..=5.0 + 1e-9).contains(&r), "radius {r}");
        }
        assert_eq!(
            set.data.get(LEVEL_DATA),
            Some(&DataValues::Float(vec![95.0; set.vertex_count()]))
        );
    }

    #[test]
    fn saddle_cuts_off_high_corners() {
        let source = GridData::new(unit_grid(2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let lines = ContourTracerKind::MarchingSquares.trace(&source, 0.5);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.len(), 2);
        }
        // The first line cuts off corner (0, 0).
        let points = lines[0].points();
        assert!(points.contains(&Point::new(0.0, 0.5)));
        assert!(points.contains(&Point::new(0.5, 0.0)));
    }

    #[test]
    fn interval_levels_add_rings() {
        let source = cone(21);
        let one = detect_contours(&source, &levels(vec![95.0])).unwrap();
        let config = ContourConfig {
            interval_min: Some(93.0),
            interval_max: Some(97.0),
            interval_spacing: Some(2.0),
            fixed_contours: Vec::new(),
        };
        let three = detect_contours(&source, &config).unwrap();
        assert!(three.vertex_count() > one.vertex_count());
    }

    #[test]
    fn out_of_range_levels_raise() {
        let source = cone(11);
        assert!(matches!(
            detect_contours(&source, &levels(vec![500.0, -500.0])),
            Err(CurveError::NoContours)
        ));
        let set = trace_contours(
            &source,
            &levels(vec![500.0]),
            &ContourTracerKind::MarchingSquares,
        )
        .unwrap();
        assert_eq!(set.cell_count(), 0);
    }

    #[test]
    fn missing_values_break_lines() {
        let mut source = ramp(6, 4);
        let index = source.grid.value_index(2, 1);
        source.values[index] = f64::NAN;
        // Squares touching (2, 1) are skipped; only the top square of the
        // u = 2..3 column remains.
        let set = detect_contours(&source, &levels(vec![2.5])).unwrap();
        assert_eq!(set.vertex_count(), 2);
        assert_eq!(set.cell_count(), 1);
        for p in &set.vertices {
            assert!(p.y >= 2.5);
        }
    }
}

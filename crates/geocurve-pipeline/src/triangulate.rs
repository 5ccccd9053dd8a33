//! Triangulation of point locations.
//!
//! The [`Triangulator`] trait is the seam to the triangulation backend and
//! [`TriangulatorKind`] selects an implementation at runtime. Triangles
//! are returned as triples of input indices.

use log::debug;
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::types::{CurveError, Point};

/// Selects which triangulation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriangulatorKind {
    /// Incremental Delaunay triangulation via `spade`.
    #[default]
    Delaunay,
}

/// Trait for triangulation strategies.
pub trait Triangulator {
    /// Triangulate `points`, returning triangles as input index triples.
    ///
    /// Fewer than three points, or points that are all collinear, give an
    /// empty result.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::Triangulation`] if the backend rejects a
    /// point (e.g. a non-finite coordinate).
    fn triangulate(&self, points: &[Point]) -> Result<Vec<[usize; 3]>, CurveError>;
}

impl Triangulator for TriangulatorKind {
    fn triangulate(&self, points: &[Point]) -> Result<Vec<[usize; 3]>, CurveError> {
        match *self {
            Self::Delaunay => triangulate_delaunay(points),
        }
    }
}

/// Delaunay triangulation with `spade`.
///
/// Points sharing a location collapse onto one vertex; that vertex keeps
/// the index of the first occurrence.
fn triangulate_delaunay(points: &[Point]) -> Result<Vec<[usize; 3]>, CurveError> {
    if points.len() < 3 {
        return Ok(Vec::new());
    }

    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    // Input index owning each triangulation vertex, by vertex handle index.
    let mut owners: Vec<usize> = Vec::with_capacity(points.len());

    for (index, point) in points.iter().enumerate() {
        let before = triangulation.num_vertices();
        triangulation
            .insert(Point2::new(point.x, point.y))
            .map_err(|e| CurveError::Triangulation(format!("point {index}: {e:?}")))?;
        if triangulation.num_vertices() > before {
            owners.push(index);
        }
    }

    if owners.len() < points.len() {
        debug!(
            "triangulation merged {} duplicate points",
            points.len() - owners.len()
        );
    }

    Ok(triangulation
        .inner_faces()
        .map(|face| face.vertices().map(|v| owners[v.fix().index()]))
        .collect())
}

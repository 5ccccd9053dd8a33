//! Shared types for the geocurve detection pipeline.

use std::collections::BTreeMap;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

/// A 2D point in world (or raster) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Easting (or column).
    pub x: f64,
    /// Northing (or row).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Dot product, treating both points as vectors from the origin.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Length of the point as a vector from the origin.
    #[must_use]
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// A directed edge between two point indices.
///
/// Candidate edges are stored in canonical form (`from < to`); path
/// edges keep the direction in which they were walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Index of the start point.
    pub from: usize,
    /// Index of the end point.
    pub to: usize,
}

impl Edge {
    /// Create a new directed edge.
    #[must_use]
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// The same edge walked in the opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self::new(self.to, self.from)
    }

    /// The edge with its endpoints in ascending order.
    #[must_use]
    pub const fn canonical(self) -> Self {
        if self.from <= self.to {
            self
        } else {
            self.reversed()
        }
    }

    /// Direction vector from the start point to the end point.
    #[must_use]
    pub fn vector(self, points: &[Point]) -> Point {
        points[self.to] - points[self.from]
    }
}

/// An ordered chain of directed edges; consecutive edges share an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    edges: Vec<Edge>,
}

impl Path {
    /// Assemble a path from a seed edge and the two walks grown from it.
    ///
    /// `forward` continues from `seed.to`; `backward` continues from
    /// `seed.from` (it was walked along the reversed seed) and is flipped
    /// onto the head of the path.
    #[must_use]
    pub fn from_walks(seed: Edge, forward: Vec<Edge>, backward: Vec<Edge>) -> Self {
        let mut edges = Vec::with_capacity(forward.len() + backward.len() + 1);
        edges.extend(backward.into_iter().rev().map(Edge::reversed));
        edges.push(seed);
        edges.extend(forward);
        Self { edges }
    }

    /// The directed edges of the path, head to tail.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the path has no edges.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Point indices visited by the path, in walking order.
    #[must_use]
    pub fn vertices(&self) -> Vec<usize> {
        let mut vertices = Vec::with_capacity(self.edges.len() + 1);
        if let Some(first) = self.edges.first() {
            vertices.push(first.from);
        }
        vertices.extend(self.edges.iter().map(|e| e.to));
        vertices
    }

    /// Re-index every endpoint through `map`.
    #[must_use]
    pub fn map_indices(&self, map: impl Fn(usize) -> usize) -> Self {
        Self {
            edges: self
                .edges
                .iter()
                .map(|e| Edge::new(map(e.from), map(e.to)))
                .collect(),
        }
    }
}

/// Values of a per-vertex data array attached to a [`CurveSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum DataValues {
    /// Integer (referenced / label) data.
    Integer(Vec<i64>),
    /// Floating point data.
    Float(Vec<f64>),
}

impl DataValues {
    /// Number of values in the array.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Integer(values) => values.len(),
            Self::Float(values) => values.len(),
        }
    }

    /// Returns `true` if the array holds no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Curve geometry ready to hand to a persistence layer.
///
/// `cells` index into `vertices`; every data array holds one value per
/// vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    /// Vertex coordinates.
    pub vertices: Vec<Point>,
    /// Segments as vertex index pairs.
    pub cells: Vec<[u32; 2]>,
    /// Named per-vertex data arrays.
    #[serde(default)]
    pub data: BTreeMap<String, DataValues>,
}

impl CurveSet {
    /// Create a curve set without data arrays.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidCell`] if any cell references a
    /// vertex outside `vertices`.
    pub fn new(vertices: Vec<Point>, cells: Vec<[u32; 2]>) -> Result<Self, CurveError> {
        let vertex_count = vertices.len();
        if let Some(cell) = cells
            .iter()
            .find(|cell| cell.iter().any(|&i| i as usize >= vertex_count))
        {
            return Err(CurveError::InvalidCell {
                cell: *cell,
                vertex_count,
            });
        }
        Ok(Self {
            vertices,
            cells,
            data: BTreeMap::new(),
        })
    }

    /// Attach a per-vertex data array under `name`, replacing any array
    /// already stored under that name.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::LengthMismatch`] if `values` does not hold
    /// exactly one value per vertex.
    pub fn with_data(
        mut self,
        name: impl Into<String>,
        values: DataValues,
    ) -> Result<Self, CurveError> {
        check_length("vertex data", self.vertices.len(), values.len())?;
        self.data.insert(name.into(), values);
        Ok(self)
    }

    /// Number of vertices.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of cells.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Iterate cells as pairs of vertex coordinates.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.cells
            .iter()
            .map(|&[a, b]| (self.vertices[a as usize], self.vertices[b as usize]))
    }
}

/// Convert a vertex index to the `u32` used by cells.
pub(crate) fn cell_index(index: usize) -> Result<u32, CurveError> {
    u32::try_from(index).map_err(|_| CurveError::IndexOverflow(index))
}

/// Check that an input array has the expected length.
pub(crate) const fn check_length(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), CurveError> {
    if expected == actual {
        Ok(())
    } else {
        Err(CurveError::LengthMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// Errors that can occur during curve detection.
#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input array does not match the size of the data it annotates.
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Which input was wrong.
        what: &'static str,
        /// Required number of entries.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },

    /// A cell references a vertex that does not exist.
    #[error("cell {cell:?} references a vertex outside 0..{vertex_count}")]
    InvalidCell {
        /// The offending cell.
        cell: [u32; 2],
        /// Number of vertices available.
        vertex_count: usize,
    },

    /// The triangulation backend rejected the input points.
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// A vertex index does not fit the `u32` cell format.
    #[error("vertex index {0} does not fit in a u32 cell")]
    IndexOverflow(usize),

    /// The grid holds no finite value.
    #[error("no data to process")]
    NoData,

    /// No contour matched any requested level.
    #[error(
        "no contours detected; check that the requested contour values are within the bounds of the data"
    )]
    NoContours,
}

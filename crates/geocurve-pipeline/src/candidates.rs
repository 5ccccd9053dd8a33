//! Candidate edges for the trend-line search.
//!
//! Edges come from a triangulation of the point locations and are pruned
//! by length, part membership and (optionally) orientation. The result
//! is sorted by length so the shortest edges seed paths first.

use std::collections::BTreeSet;

use log::debug;

use crate::config::{AzimuthFilter, DetectionConfig};
use crate::triangulate::Triangulator;
use crate::types::{CurveError, Edge, Point, check_length};

/// An undirected edge (canonical `from < to`) with its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateEdge {
    /// The canonical endpoint pair.
    pub edge: Edge,
    /// Euclidean length.
    pub length: f64,
}

/// Build the sorted, filtered candidate edges for one group of points.
///
/// `parts` holds one part label per point; an edge survives only when its
/// endpoints belong to different parts.
///
/// # Errors
///
/// Returns [`CurveError::LengthMismatch`] if `parts` and `points` differ
/// in length, or the triangulator's error.
pub fn build_candidate_edges(
    points: &[Point],
    parts: &[i64],
    config: &DetectionConfig,
    triangulator: &impl Triangulator,
) -> Result<Vec<CandidateEdge>, CurveError> {
    check_length("parts", points.len(), parts.len())?;

    let triangles = triangulator.triangulate(points)?;
    let unique: BTreeSet<Edge> = triangles
        .iter()
        .flat_map(|&[a, b, c]| [Edge::new(a, b), Edge::new(b, c), Edge::new(c, a)])
        .map(Edge::canonical)
        .collect();

    // BTreeSet iteration is in index order, so the stable sort breaks
    // length ties by endpoint pair.
    let mut candidates: Vec<CandidateEdge> = unique
        .into_iter()
        .map(|edge| CandidateEdge {
            edge,
            length: points[edge.from].distance(points[edge.to]),
        })
        .collect();
    candidates.sort_by(|a, b| a.length.total_cmp(&b.length));
    let triangulated = candidates.len();

    if let Some(max_distance) = config.max_distance {
        candidates.retain(|c| c.length <= max_distance);
    }
    candidates.retain(|c| parts[c.edge.from] != parts[c.edge.to]);

    if let Some(filter) = &config.azimuth {
        let edges: Vec<Edge> = candidates.iter().map(|c| c.edge).collect();
        let keep = filter_segments_orientation(points, &edges, filter);
        let mut keep = keep.into_iter();
        candidates.retain(|_| keep.next().unwrap_or(false));
    }

    debug!(
        "{} candidate edges kept of {triangulated} triangulated",
        candidates.len()
    );
    Ok(candidates)
}

/// Flag the segments aligned with the filter's azimuth.
///
/// A segment passes when the angle between its direction and the azimuth
/// is strictly within the tolerance of 0 or 180 degrees, so the direction
/// of travel along the segment does not matter. Zero-length segments
/// never pass.
#[must_use]
pub fn filter_segments_orientation(
    points: &[Point],
    segments: &[Edge],
    filter: &AzimuthFilter,
) -> Vec<bool> {
    let (dx, dy) = filter.direction();
    let target = Point::new(dx, dy);
    let tolerance = filter.tolerance.to_radians();

    segments
        .iter()
        .map(|segment| {
            let vector = segment.vector(points);
            let norm = vector.norm();
            if norm == 0.0 {
                return false;
            }
            let angle = (vector.dot(target) / norm).clamp(-1.0, 1.0).acos();
            angle.abs() < tolerance || (angle - std::f64::consts::PI).abs() < tolerance
        })
        .collect()
}

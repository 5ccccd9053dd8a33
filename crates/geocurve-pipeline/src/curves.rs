//! Path search over one group of points.

use log::debug;

use crate::candidates::build_candidate_edges;
use crate::config::DetectionConfig;
use crate::triangulate::{Triangulator, TriangulatorKind};
use crate::types::{CurveError, Path, Point};
use crate::walk::{CandidateGraph, PathWalker, VisitMask};

/// Find connected paths across the parts of one group of points.
///
/// Candidate edges are tried as seeds from shortest to longest. A seed
/// whose endpoints are both unvisited is walked in both directions and
/// the result is kept if it has at least `config.min_edges` edges. Points
/// used by a discarded path stay visited.
///
/// Returned paths index into `points`.
///
/// # Errors
///
/// Returns [`CurveError::InvalidConfig`] for an invalid configuration,
/// [`CurveError::LengthMismatch`] if `parts` does not match `points`, or
/// a triangulation error.
pub fn find_curves(
    points: &[Point],
    parts: &[i64],
    config: &DetectionConfig,
) -> Result<Vec<Path>, CurveError> {
    find_curves_with(points, parts, config, &TriangulatorKind::default())
}

/// [`find_curves`] with an explicit triangulation backend.
///
/// # Errors
///
/// See [`find_curves`].
pub fn find_curves_with(
    points: &[Point],
    parts: &[i64],
    config: &DetectionConfig,
    triangulator: &impl Triangulator,
) -> Result<Vec<Path>, CurveError> {
    config.validate()?;
    let candidates = build_candidate_edges(points, parts, config, triangulator)?;
    let graph = CandidateGraph::new(points.len(), &candidates);
    let walker = PathWalker::new(&graph, points, config.damping)?;
    let mut mask = VisitMask::new(points.len());

    let mut paths = Vec::new();
    let mut discarded = 0_usize;
    for candidate in &candidates {
        let seed = candidate.edge;
        if mask.is_visited(seed.from) || mask.is_visited(seed.to) {
            continue;
        }
        mask.visit(seed.from);
        mask.visit(seed.to);

        let forward = walker.walk(seed, &mut mask);
        let backward = walker.walk(seed.reversed(), &mut mask);
        let path = Path::from_walks(seed, forward, backward);

        if path.len() >= config.min_edges {
            paths.push(path);
        } else {
            discarded += 1;
        }
    }

    debug!(
        "{} paths from {} points ({} candidates, {discarded} short paths discarded)",
        paths.len(),
        points.len(),
        candidates.len()
    );
    Ok(paths)
}

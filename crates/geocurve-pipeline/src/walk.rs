//! Greedy path walking over the candidate edge graph.
//!
//! From the terminal point of the incoming edge, the walker picks the
//! unvisited neighbour that best continues the current direction, marks it
//! visited and repeats until no forward continuation remains.
//!
//! A continuation is scored as `angle^(1 - damping) * length`, where
//! `angle` is the turning angle in radians. With `damping = 1` the angle
//! drops out and the nearest forward neighbour wins; with `damping = 0`
//! sharp turns are penalized in proportion to the step length.

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::candidates::CandidateEdge;
use crate::config::validate_damping;
use crate::types::{CurveError, Edge, Point};

/// Subtracted from the turning-angle cosine so a straight continuation
/// scores a small positive angle.
pub const ANGLE_EPSILON: f64 = 1e-10;

/// Adjacency over the candidate edges of one group.
///
/// Edges are added in candidate order, so an edge's index is its rank in
/// the length-sorted candidate list.
#[derive(Debug, Clone)]
pub struct CandidateGraph {
    graph: UnGraph<(), f64>,
}

impl CandidateGraph {
    /// Build the graph over `point_count` points.
    #[must_use]
    pub fn new(point_count: usize, candidates: &[CandidateEdge]) -> Self {
        let mut graph = UnGraph::with_capacity(point_count, candidates.len());
        for _ in 0..point_count {
            graph.add_node(());
        }
        for candidate in candidates {
            graph.add_edge(
                NodeIndex::new(candidate.edge.from),
                NodeIndex::new(candidate.edge.to),
                candidate.length,
            );
        }
        Self { graph }
    }

    /// Number of points (nodes).
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of candidate edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Points joined to `point` by a candidate edge, with the rank of
    /// that edge.
    fn neighbours(&self, point: usize) -> impl Iterator<Item = (usize, EdgeIndex)> + '_ {
        self.graph
            .edges(NodeIndex::new(point))
            .map(|e| (e.target().index(), e.id()))
    }
}

/// Which points have already been used by a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitMask(Vec<bool>);

impl VisitMask {
    /// All points unvisited.
    #[must_use]
    pub fn new(point_count: usize) -> Self {
        Self(vec![false; point_count])
    }

    /// Mark a point visited.
    pub fn visit(&mut self, point: usize) {
        self.0[point] = true;
    }

    /// Whether a point has been visited.
    #[must_use]
    pub fn is_visited(&self, point: usize) -> bool {
        self.0[point]
    }

    /// Number of visited points.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.0.iter().filter(|&&v| v).count()
    }
}

/// Walks paths over a [`CandidateGraph`].
#[derive(Debug, Clone, Copy)]
pub struct PathWalker<'a> {
    graph: &'a CandidateGraph,
    points: &'a [Point],
    damping: f64,
}

impl<'a> PathWalker<'a> {
    /// Create a walker.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] if `damping` is outside
    /// `[0, 1]`, or [`CurveError::LengthMismatch`] if the graph and point
    /// slice disagree on the number of points.
    pub fn new(
        graph: &'a CandidateGraph,
        points: &'a [Point],
        damping: f64,
    ) -> Result<Self, CurveError> {
        validate_damping(damping)?;
        crate::types::check_length("points", graph.point_count(), points.len())?;
        Ok(Self {
            graph,
            points,
            damping,
        })
    }

    /// Extend a path beyond `incoming`, returning the edges walked.
    ///
    /// Every point reached is marked in `mask`. The endpoints of
    /// `incoming` are expected to be marked by the caller.
    pub fn walk(&self, incoming: Edge, mask: &mut VisitMask) -> Vec<Edge> {
        let mut walked = Vec::new();
        let mut current = incoming;
        while let Some(next) = self.best_continuation(current, mask) {
            mask.visit(next.to);
            walked.push(next);
            current = next;
        }
        walked
    }

    /// The lowest-scoring forward continuation of `incoming`.
    ///
    /// Ties go to the lower-ranked (shorter) candidate edge.
    fn best_continuation(&self, incoming: Edge, mask: &VisitMask) -> Option<Edge> {
        let direction = incoming.vector(self.points);
        let direction_norm = direction.norm();
        let exponent = 1.0 - self.damping;

        let mut best: Option<(f64, EdgeIndex, usize)> = None;
        for (neighbour, rank) in self.graph.neighbours(incoming.to) {
            if mask.is_visited(neighbour) {
                continue;
            }
            let step = self.points[neighbour] - self.points[incoming.to];
            let dot = direction.dot(step);
            if dot <= 0.0 {
                continue;
            }
            let length = step.norm();
            let cosine = (dot / (direction_norm * length) - ANGLE_EPSILON).clamp(-1.0, 1.0);
            let score = cosine.acos().powf(exponent) * length;

            let better = best.is_none_or(|(best_score, best_rank, _)| {
                score
                    .total_cmp(&best_score)
                    .then(rank.cmp(&best_rank))
                    .is_lt()
            });
            if better {
                best = Some((score, rank, neighbour));
            }
        }
        best.map(|(_, _, neighbour)| Edge::new(incoming.to, neighbour))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn candidate(points: &[Point], a: usize, b: usize) -> CandidateEdge {
        CandidateEdge {
            edge: Edge::new(a, b).canonical(),
            length: points[a].distance(points[b]),
        }
    }

    fn graph_of(points: &[Point], pairs: &[(usize, usize)]) -> CandidateGraph {
        let mut candidates: Vec<CandidateEdge> =
            pairs.iter().map(|&(a, b)| candidate(points, a, b)).collect();
        candidates.sort_by(|a, b| a.length.total_cmp(&b.length));
        CandidateGraph::new(points.len(), &candidates)
    }

    #[test]
    fn damping_out_of_range_rejected() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let graph = graph_of(&points, &[(0, 1)]);
        assert!(PathWalker::new(&graph, &points, 1.2).is_err());
        assert!(PathWalker::new(&graph, &points, -0.2).is_err());
        assert!(PathWalker::new(&graph, &points, 0.5).is_ok());
    }

    #[test]
    fn point_count_mismatch_rejected() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let graph = CandidateGraph::new(3, &[]);
        assert!(matches!(
            PathWalker::new(&graph, &points, 0.5),
            Err(CurveError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn walks_a_straight_chain() {
        let points: Vec<Point> = (0..5).map(|i| Point::new(f64::from(i), 0.0)).collect();
        let graph = graph_of(&points, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let walker = PathWalker::new(&graph, &points, 0.0).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        let walked = walker.walk(Edge::new(0, 1), &mut mask);
        assert_eq!(
            walked,
            vec![Edge::new(1, 2), Edge::new(2, 3), Edge::new(3, 4)]
        );
        assert_eq!(mask.visited_count(), 5);
    }

    #[test]
    fn never_turns_back() {
        // From 0->1 the only neighbour lies behind the incoming direction.
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.5, 0.1),
        ];
        let graph = graph_of(&points, &[(0, 1), (1, 2)]);
        let walker = PathWalker::new(&graph, &points, 0.0).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        assert!(walker.walk(Edge::new(0, 1), &mut mask).is_empty());
        assert!(!mask.is_visited(2));
    }

    #[test]
    fn perpendicular_step_rejected() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ];
        let graph = graph_of(&points, &[(0, 1), (1, 2)]);
        let walker = PathWalker::new(&graph, &points, 1.0).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        assert!(walker.walk(Edge::new(0, 1), &mut mask).is_empty());
    }

    /// From 0->1, point 2 is straight ahead but far, point 3 is close but
    /// off at 45 degrees.
    fn fork() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 1.0),
        ]
    }

    #[test]
    fn full_damping_takes_nearest() {
        let points = fork();
        let graph = graph_of(&points, &[(0, 1), (1, 2), (1, 3)]);
        let walker = PathWalker::new(&graph, &points, 1.0).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        let walked = walker.walk(Edge::new(0, 1), &mut mask);
        assert_eq!(walked.first(), Some(&Edge::new(1, 3)));
    }

    #[test]
    fn zero_damping_takes_straightest() {
        let points = fork();
        let graph = graph_of(&points, &[(0, 1), (1, 2), (1, 3)]);
        let walker = PathWalker::new(&graph, &points, 0.0).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        let walked = walker.walk(Edge::new(0, 1), &mut mask);
        assert_eq!(walked, vec![Edge::new(1, 2)]);
    }

    #[test]
    fn visited_neighbours_skipped() {
        let points = fork();
        let graph = graph_of(&points, &[(0, 1), (1, 2), (1, 3)]);
        let walker = PathWalker::new(&graph, &points, 0.0).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        mask.visit(2);
        let walked = walker.walk(Edge::new(0, 1), &mut mask);
        assert_eq!(walked, vec![Edge::new(1, 3)]);
    }

    #[test]
    fn equal_scores_prefer_lower_rank() {
        // Two mirror-image continuations with identical scores.
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, -1.0),
        ];
        let candidates = vec![
            candidate(&points, 0, 1),
            candidate(&points, 1, 3),
            candidate(&points, 1, 2),
        ];
        let graph = CandidateGraph::new(points.len(), &candidates);
        let walker = PathWalker::new(&graph, &points, 0.5).unwrap();
        let mut mask = VisitMask::new(points.len());
        mask.visit(0);
        mask.visit(1);
        let walked = walker.walk(Edge::new(0, 1), &mut mask);
        assert_eq!(walked, vec![Edge::new(1, 3)]);
    }
}

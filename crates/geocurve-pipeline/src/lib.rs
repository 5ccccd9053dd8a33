//! geocurve-pipeline: curve detection for geoscience data (sans-IO).
//!
//! Three detectors, all producing a [`CurveSet`] (vertices, segment cells
//! and per-vertex data):
//!
//! - **Trend lines** ([`connect_parts`]): triangulate a labeled point
//!   cloud, keep the edges that cross between parts (e.g. survey lines),
//!   then greedily walk them into direction-continuous paths.
//! - **Edges** ([`detect_edges`]): Canny + Hough line segments on a
//!   regular grid.
//! - **Contours** ([`detect_contours`]): marching-squares iso-lines on a
//!   regular grid.
//!
//! This crate has **no I/O dependencies**: it works on in-memory data and
//! reports through the `log` facade. Reading inputs and writing results
//! lives in `geocurve-cli`.

pub mod candidates;
pub mod config;
pub mod connect;
pub mod contours;
pub mod curves;
pub mod edges;
pub mod grid;
pub mod hough;
pub mod triangulate;
pub mod types;
pub mod walk;

pub use candidates::{CandidateEdge, build_candidate_edges, filter_segments_orientation};
pub use config::{AzimuthFilter, ContourConfig, DetectionConfig, EdgeDetectionConfig};
pub use connect::{Connections, DEFAULT_BACKGROUND_LABEL, PartsSource, connect_parts};
pub use contours::{ContourTracer, ContourTracerKind, detect_contours, trace_contours};
pub use curves::{find_curves, find_curves_with};
pub use edges::detect_edges;
pub use grid::{Grid2D, GridData, overlapping_limits};
pub use triangulate::{Triangulator, TriangulatorKind};
pub use types::{CurveError, CurveSet, DataValues, Edge, Path, Point, Polyline};
pub use walk::{CandidateGraph, PathWalker, VisitMask};

//! Trend-line detection over a labeled point cloud.
//!
//! Points are split into groups by label; each group is searched on its
//! own with [`find_curves`] and the resulting paths are merged into one
//! compact vertex/cell set.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
use crate::curves::find_curves;
use crate::types::{CurveError, CurveSet, DataValues, Edge, Point, cell_index, check_length};

/// Group label skipped by default (background / unassigned points).
pub const DEFAULT_BACKGROUND_LABEL: i64 = 0;

/// A point cloud with optional part and group labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartsSource {
    /// Point locations.
    pub vertices: Vec<Point>,
    /// Part (e.g. survey line) of every point; each point is its own part
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<i64>>,
    /// Group label of every point; all points share label `1` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<i64>>,
}

impl PartsSource {
    /// A source with neither parts nor labels.
    #[must_use]
    pub const fn new(vertices: Vec<Point>) -> Self {
        Self {
            vertices,
            parts: None,
            labels: None,
        }
    }

    /// Part labels, defaulting to one part per point.
    fn resolved_parts(&self) -> Result<Vec<i64>, CurveError> {
        match &self.parts {
            Some(parts) => {
                check_length("parts", self.vertices.len(), parts.len())?;
                Ok(parts.clone())
            }
            None => (0..self.vertices.len())
                .map(|i| i64::try_from(i).map_err(|_| CurveError::IndexOverflow(i)))
                .collect(),
        }
    }

    /// Group labels, defaulting to `1` everywhere.
    fn resolved_labels(&self) -> Result<Vec<i64>, CurveError> {
        match &self.labels {
            Some(labels) => {
                check_length("labels", self.vertices.len(), labels.len())?;
                Ok(labels.clone())
            }
            None => Ok(vec![1; self.vertices.len()]),
        }
    }
}

/// Result of [`connect_parts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    /// Vertices used by the paths, or the full input when nothing was
    /// found.
    pub vertices: Vec<Point>,
    /// Segments into `vertices`; `None` when no path was found.
    pub cells: Option<Vec<[u32; 2]>>,
    /// Group label of every vertex (all `0` when nothing was found).
    pub labels: Vec<i64>,
    /// Input index of every vertex.
    pub source_indices: Vec<usize>,
}

impl Connections {
    /// Whether any path was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.as_ref().is_none_or(Vec::is_empty)
    }

    /// Number of output cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.as_ref().map_or(0, Vec::len)
    }

    /// Convert to a curve set carrying the labels as integer data under
    /// `data_name`.
    ///
    /// Returns `Ok(None)` when no connection was found.
    ///
    /// # Errors
    ///
    /// Propagates [`CurveSet`] construction errors.
    pub fn into_curve_set(self, data_name: &str) -> Result<Option<CurveSet>, CurveError> {
        let Some(cells) = self.cells else {
            return Ok(None);
        };
        if cells.is_empty() {
            return Ok(None);
        }
        CurveSet::new(self.vertices, cells)?
            .with_data(data_name, DataValues::Integer(self.labels))
            .map(Some)
    }
}

/// Detect trend lines in every label group of `source`.
///
/// Groups are processed in ascending label order; `background` (if any)
/// is skipped, as are groups with fewer than two points. Paths from all
/// groups are merged and their vertices renumbered compactly in input
/// order. When no path is found anywhere, the input vertices are returned
/// unchanged with no cells and all-zero labels.
///
/// # Errors
///
/// Returns [`CurveError::LengthMismatch`] if parts or labels do not match
/// the vertices, [`CurveError::InvalidConfig`] for an invalid `config`,
/// [`CurveError::IndexOverflow`] if the output does not fit `u32` cells,
/// or a triangulation error.
pub fn connect_parts(
    source: &PartsSource,
    config: &DetectionConfig,
    background: Option<i64>,
) -> Result<Connections, CurveError> {
    config.validate()?;
    let parts = source.resolved_parts()?;
    let labels = source.resolved_labels()?;

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        if Some(label) != background {
            groups.entry(label).or_default().push(index);
        }
    }

    // (label, path in input indices)
    let mut found: Vec<(i64, Vec<Edge>)> = Vec::new();
    for (&label, members) in &groups {
        if members.len() < 2 {
            debug!("label {label}: {} point, skipped", members.len());
            continue;
        }
        let points: Vec<Point> = members.iter().map(|&i| source.vertices[i]).collect();
        let group_parts: Vec<i64> = members.iter().map(|&i| parts[i]).collect();
        let paths = find_curves(&points, &group_parts, config)?;
        debug!(
            "label {label}: {} paths from {} points",
            paths.len(),
            members.len()
        );
        found.extend(
            paths
                .iter()
                .map(|path| (label, path.map_indices(|i| members[i]).edges().to_vec())),
        );
    }

    if found.is_empty() {
        info!("no connections found");
        return Ok(Connections {
            vertices: source.vertices.clone(),
            cells: None,
            labels: vec![0; source.vertices.len()],
            source_indices: (0..source.vertices.len()).collect(),
        });
    }

    let mut out_labels = vec![0_i64; source.vertices.len()];
    let mut used = BTreeSet::new();
    for (label, edges) in &found {
        for edge in edges {
            out_labels[edge.from] = *label;
            out_labels[edge.to] = *label;
            used.insert(edge.from);
            used.insert(edge.to);
        }
    }

    let source_indices: Vec<usize> = used.into_iter().collect();
    let mut compact = vec![0_usize; source.vertices.len()];
    for (new, &old) in source_indices.iter().enumerate() {
        compact[old] = new;
    }

    let cells = found
        .iter()
        .flat_map(|(_, edges)| edges)
        .map(|edge| Ok([cell_index(compact[edge.from])?, cell_index(compact[edge.to])?]))
        .collect::<Result<Vec<_>, CurveError>>()?;

    info!(
        "{} paths, {} segments over {} vertices",
        found.len(),
        cells.len(),
        source_indices.len()
    );

    Ok(Connections {
        vertices: source_indices.iter().map(|&i| source.vertices[i]).collect(),
        cells: Some(cells),
        labels: source_indices.iter().map(|&i| out_labels[i]).collect(),
        source_indices,
    })
}

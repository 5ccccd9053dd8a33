//! Edge detection on gridded data.
//!
//! The grid is normalized to an 8-bit raster, blurred and passed through
//! Canny. Straight segments are then extracted tile by tile with the
//! Hough transform ([`crate::hough`]), their endpoints optionally merged
//! and deduplicated, and the result mapped back to world coordinates.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use log::{debug, info};
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::config::EdgeDetectionConfig;
use crate::grid::{GridData, overlapping_limits};
use crate::hough::{PixelSegment, SegmentOptions, detect_segments};
use crate::types::{CurveError, CurveSet, DataValues, Point, cell_index};

/// Minimum allowed Canny threshold.
///
/// A zero low threshold marks every pixel with any gradient as a
/// potential edge and floods the Hough stage.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Smoothing `imageproc::edges::canny` applies before taking gradients.
const CANNY_BLUR_SIGMA: f32 = 1.4;

/// Name of the per-vertex segment azimuth array.
pub const AZIMUTH_DATA: &str = "azimuth";
/// Name of the per-vertex segment length array.
pub const LENGTHS_DATA: &str = "lengths";

/// Endpoint pixel tagged with its position in the endpoint list.
type IndexedEndpoint = GeomWithData<[f64; 2], usize>;

/// Detect straight edges in `source` and return them as curves.
///
/// Returns `Ok(None)` when no segment is found.
///
/// # Errors
///
/// Returns [`CurveError::InvalidConfig`] for an invalid grid or
/// configuration, [`CurveError::LengthMismatch`] if the values do not
/// fill the grid, and [`CurveError::NoData`] if no value is finite.
pub fn detect_edges(
    source: &GridData,
    config: &EdgeDetectionConfig,
) -> Result<Option<CurveSet>, CurveError> {
    let edges = canny_edges(source, config)?;
    let curves = segments_to_curves(source, &edges, config)?;
    match &curves {
        Some(set) => info!(
            "edge detection: {} segments over {} vertices",
            set.cell_count(),
            set.vertex_count()
        ),
        None => info!("edge detection: no segments found"),
    }
    Ok(curves)
}

/// Binary Canny edge map of the grid values (255 = edge).
///
/// Pixel `(x, y)` corresponds to grid cell `(u, v)`. Cells without data
/// are never edges.
///
/// # Errors
///
/// See [`detect_edges`].
pub fn canny_edges(source: &GridData, config: &EdgeDetectionConfig) -> Result<GrayImage, CurveError> {
    source.validate()?;
    config.validate()?;

    let (gray, missing) = normalize(source)?;
    let blurred = imageproc::filter::gaussian_blur_f32(&gray, config.sigma);
    let mut edges = canny_quantiles(&blurred, config.canny_low, config.canny_high);

    let width = source.grid.u_count;
    for (index, _) in missing.iter().enumerate().filter(|(_, m)| **m) {
        let (x, y) = pixel_of(index, width);
        edges.put_pixel(x, y, Luma([0]));
    }
    Ok(edges)
}

/// Run Canny with both thresholds clamped to at least [`MIN_THRESHOLD`]
/// and the low threshold clamped to at most the high one.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Run Canny with thresholds given as quantiles of the gradient
/// magnitude.
///
/// The magnitudes are those Canny itself thresholds: Sobel gradients of
/// the image after its internal blur.
#[must_use = "returns the binary edge map"]
pub fn canny_quantiles(image: &GrayImage, low_quantile: f32, high_quantile: f32) -> GrayImage {
    let smoothed = imageproc::filter::gaussian_blur_f32(image, CANNY_BLUR_SIGMA);
    let mut magnitudes: Vec<f32> = imageproc::gradients::sobel_gradients(&smoothed)
        .pixels()
        .map(|p| f32::from(p.0[0]))
        .collect();
    magnitudes.sort_by(f32::total_cmp);

    let low = quantile(&magnitudes, low_quantile);
    let high = quantile(&magnitudes, high_quantile);
    debug!("canny quantiles {low_quantile}/{high_quantile} -> thresholds {low}/{high}");
    canny(image, low, high)
}

/// Linearly interpolated `q` quantile of ascending `sorted`.
fn quantile(sorted: &[f32], q: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    #[allow(clippy::cast_precision_loss)]
    let position = q.clamp(0.0, 1.0) * last as f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let below = (position.floor() as usize).min(last);
    let above = (below + 1).min(last);
    #[allow(clippy::cast_precision_loss)]
    let fraction = position - below as f32;
    (sorted[above] - sorted[below]).mul_add(fraction, sorted[below])
}

/// Extract segments from an edge map of `source` and build curves.
///
/// Returns `Ok(None)` when no segment is found.
///
/// # Errors
///
/// Returns [`CurveError::LengthMismatch`] if `edges` does not match the
/// grid size, or [`CurveError::IndexOverflow`] for oversized output.
pub fn segments_to_curves(
    source: &GridData,
    edges: &GrayImage,
    config: &EdgeDetectionConfig,
) -> Result<Option<CurveSet>, CurveError> {
    let grid = &source.grid;
    crate::types::check_length("edge map", grid.cell_count(), edges.len())?;

    let segments = tiled_segments(edges, config);
    if segments.is_empty() {
        return Ok(None);
    }

    let mut endpoints: Vec<(u32, u32)> = segments.iter().flat_map(|s| [s.start, s.end]).collect();
    if let Some(merge_length) = config.merge_length {
        merge_endpoints(source, &mut endpoints, merge_length);
    }

    // Sorted unique pixels; cells index into them.
    let pairs: Vec<[(u32, u32); 2]> = endpoints
        .chunks_exact(2)
        .map(|pair| [pair[0], pair[1]])
        .filter(|[a, b]| a != b)
        .collect();
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut unique: BTreeMap<(u32, u32), usize> =
        pairs.iter().flatten().map(|&pixel| (pixel, 0)).collect();
    for (rank, slot) in unique.values_mut().enumerate() {
        *slot = rank;
    }

    let vertices: Vec<Point> = unique
        .keys()
        .map(|&(u, v)| grid.cell_center(f64::from(u), f64::from(v)))
        .collect();
    let cells = pairs
        .iter()
        .map(|[a, b]| Ok([cell_index(unique[a])?, cell_index(unique[b])?]))
        .collect::<Result<Vec<_>, CurveError>>()?;

    let (azimuth, lengths) = segment_vertex_data(&vertices, &cells);
    debug!(
        "{} segments reduced to {} cells over {} vertices",
        segments.len(),
        cells.len(),
        vertices.len()
    );

    CurveSet::new(vertices, cells)?
        .with_data(AZIMUTH_DATA, DataValues::Float(azimuth))?
        .with_data(LENGTHS_DATA, DataValues::Float(lengths))
        .map(Some)
}

/// Grayscale raster of the finite values and the missing-data mask.
///
/// Values are scaled linearly from their finite range to `0..=255`;
/// missing cells take the mean before scaling.
fn normalize(source: &GridData) -> Result<(GrayImage, Vec<bool>), CurveError> {
    let (min, max) = source.finite_range().ok_or(CurveError::NoData)?;
    let finite: Vec<f64> = source.values.iter().copied().filter(|v| v.is_finite()).collect();
    #[allow(clippy::cast_precision_loss)]
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let range = max - min;

    let missing: Vec<bool> = source.values.iter().map(|v| !v.is_finite()).collect();
    let grid = &source.grid;
    let gray = GrayImage::from_fn(grid.u_count, grid.v_count, |x, y| {
        let value = source.value(x, y);
        let value = if value.is_finite() { value } else { mean };
        let scaled = if range > 0.0 {
            (value - min) / range * 255.0
        } else {
            0.0
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Luma([scaled.round().clamp(0.0, 255.0) as u8])
    });
    Ok((gray, missing))
}

/// Hough segments over overlapping square tiles, in image coordinates.
fn tiled_segments(edges: &GrayImage, config: &EdgeDetectionConfig) -> Vec<PixelSegment> {
    let (width, height) = edges.dimensions();
    let mut tile = width.min(height);
    if let Some(window) = config.window_size {
        tile = tile.min(window);
    }
    let options = SegmentOptions {
        threshold: config.threshold,
        line_length: config.line_length,
        line_gap: config.line_gap,
    };

    let mut segments = Vec::new();
    for &(x0, x1) in &overlapping_limits(width, tile) {
        for &(y0, y1) in &overlapping_limits(height, tile) {
            let view = image::imageops::crop_imm(edges, x0, y0, x1 - x0, y1 - y0).to_image();
            let found = detect_segments(&view, &options);
            debug!("tile ({x0}..{x1}, {y0}..{y1}): {} segments", found.len());
            segments.extend(found.into_iter().map(|s| s.offset(x0, y0)));
        }
    }
    segments
}

/// Snap endpoints onto later endpoints within `merge_length` (world
/// distance, inclusive).
///
/// Each endpoint takes the pixel of the highest-indexed later endpoint in
/// range, as found before any snapping.
fn merge_endpoints(source: &GridData, endpoints: &mut [(u32, u32)], merge_length: f64) {
    let locations: Vec<[f64; 2]> = endpoints
        .iter()
        .map(|&(u, v)| {
            let p = source.grid.cell_center(f64::from(u), f64::from(v));
            [p.x, p.y]
        })
        .collect();
    let tree = RTree::bulk_load(
        locations
            .iter()
            .enumerate()
            .map(|(i, &loc)| IndexedEndpoint::new(loc, i))
            .collect(),
    );

    let original = endpoints.to_vec();
    let radius_squared = merge_length * merge_length;
    let mut merged = 0_usize;
    for (i, location) in locations.iter().enumerate() {
        let target = tree
            .locate_within_distance(*location, radius_squared)
            .map(|entry| entry.data)
            .filter(|&j| j > i)
            .max();
        if let Some(j) = target {
            endpoints[i] = original[j];
            merged += 1;
        }
    }
    debug!("merged {merged} endpoints within {merge_length}");
}

/// Per-vertex azimuth (degrees from north, in `[0, 180]`) and length of
/// the last cell touching each vertex.
fn segment_vertex_data(vertices: &[Point], cells: &[[u32; 2]]) -> (Vec<f64>, Vec<f64>) {
    let mut azimuth = vec![f64::NAN; vertices.len()];
    let mut lengths = vec![f64::NAN; vertices.len()];
    for &[a, b] in cells {
        let (a, b) = (a as usize, b as usize);
        let mut delta = vertices[b] - vertices[a];
        if delta.x < 0.0 {
            delta = Point::new(-delta.x, -delta.y);
        }
        let length = delta.norm();
        let orientation = (delta.y / length).clamp(-1.0, 1.0).acos().to_degrees();
        for vertex in [a, b] {
            azimuth[vertex] = orientation;
            lengths[vertex] = length;
        }
    }
    (azimuth, lengths)
}

fn pixel_of(index: usize, width: u32) -> (u32, u32) {
    let width = width as usize;
    #[allow(clippy::cast_possible_truncation)]
    ((index % width) as u32, (index / width) as u32)
}

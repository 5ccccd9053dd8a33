//! Line segments from a binary edge map.
//!
//! [`imageproc::hough::detect_lines`] finds infinite lines in polar form.
//! Each line is then rasterized across the image and split into segments
//! wherever the edge pixels along it break for more than `line_gap`
//! pixels. Pixels claimed by an accepted segment are not reused by later
//! lines.

use image::GrayImage;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};

/// Radius of the non-maximum suppression applied to the Hough
/// accumulator, in accumulator cells.
pub const SUPPRESSION_RADIUS: u32 = 2;

/// A segment between two edge pixels, as `(x, y)` image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelSegment {
    /// First pixel along the line.
    pub start: (u32, u32),
    /// Last pixel along the line.
    pub end: (u32, u32),
}

impl PixelSegment {
    /// Chebyshev length: the larger of the horizontal and vertical extents.
    #[must_use]
    pub const fn extent(&self) -> u32 {
        let dx = self.start.0.abs_diff(self.end.0);
        let dy = self.start.1.abs_diff(self.end.1);
        if dx > dy { dx } else { dy }
    }

    /// Shift by a tile offset.
    #[must_use]
    pub const fn offset(self, dx: u32, dy: u32) -> Self {
        Self {
            start: (self.start.0 + dx, self.start.1 + dy),
            end: (self.end.0 + dx, self.end.1 + dy),
        }
    }
}

/// Segment extraction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Minimum Hough votes for a line.
    pub threshold: u32,
    /// Minimum segment extent in pixels.
    pub line_length: u32,
    /// Largest run of missing pixels bridged within a segment.
    pub line_gap: u32,
}

/// Extract segments from `edges` (non-zero pixels are edges).
#[must_use]
pub fn detect_segments(edges: &GrayImage, options: &SegmentOptions) -> Vec<PixelSegment> {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let lines = detect_lines(
        edges,
        LineDetectionOptions {
            vote_threshold: options.threshold,
            suppression_radius: SUPPRESSION_RADIUS,
        },
    );

    let mut consumed = vec![false; width as usize * height as usize];
    let mut segments = Vec::new();
    for line in &lines {
        let pixels = rasterize(line, width, height);
        collect_runs(edges, &pixels, options, &mut consumed, &mut segments);
    }
    segments
}

/// Candidate pixels for each step along `line` inside a `width` x
/// `height` image, nearest first.
///
/// Steps one pixel at a time along the dominant axis of the line
/// direction. The accumulator truncates `r` toward zero, so each step
/// offers the pixel nearest the middle of that truncation bin and its
/// two neighbours across the line.
fn rasterize(line: &PolarLine, width: u32, height: u32) -> Vec<Vec<(u32, u32)>> {
    let theta = f64::from(line.angle_in_degrees).to_radians();
    let (sin, cos) = theta.sin_cos();
    let r = f64::from(line.r);
    let r = if r > 0.0 {
        r + 0.5
    } else if r < 0.0 {
        r - 0.5
    } else {
        r
    };

    // Points satisfy x * cos + y * sin = r; the line runs along (-sin, cos).
    let steep = cos.abs() >= sin.abs();
    let (steps, limit) = if steep { (height, width) } else { (width, height) };

    let mut pixels = Vec::with_capacity(steps as usize);
    for step in 0..steps {
        let t = f64::from(step);
        let other = if steep {
            (t.mul_add(-sin, r)) / cos
        } else {
            (t.mul_add(-cos, r)) / sin
        };
        let nearest = other.round();
        let mut candidates: Vec<f64> = [nearest, nearest - 1.0, nearest + 1.0]
            .into_iter()
            .filter(|c| *c >= 0.0 && *c < f64::from(limit))
            .collect();
        if candidates.is_empty() {
            continue;
        }
        candidates.sort_by(|a, b| (a - other).abs().total_cmp(&(b - other).abs()));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let step_pixels = candidates
            .into_iter()
            .map(|c| {
                let c = c as u32;
                if steep { (c, step) } else { (step, c) }
            })
            .collect();
        pixels.push(step_pixels);
    }
    pixels
}

/// Split the edge pixels along one rasterized line into segments.
///
/// Each step contributes its nearest unclaimed edge pixel, if any.
fn collect_runs(
    edges: &GrayImage,
    steps: &[Vec<(u32, u32)>],
    options: &SegmentOptions,
    consumed: &mut [bool],
    segments: &mut Vec<PixelSegment>,
) {
    let width = edges.width() as usize;
    let index = |(x, y): (u32, u32)| x as usize + y as usize * width;

    let mut run: Vec<(u32, u32)> = Vec::new();
    let mut gap = 0_u32;
    for candidates in steps {
        let hit = candidates
            .iter()
            .copied()
            .find(|&pixel| edges.get_pixel(pixel.0, pixel.1).0[0] > 0 && !consumed[index(pixel)]);
        if let Some(pixel) = hit {
            run.push(pixel);
            gap = 0;
        } else if !run.is_empty() {
            gap += 1;
            if gap > options.line_gap {
                close_run(&mut run, options, consumed, segments, index);
                gap = 0;
            }
        }
    }
    close_run(&mut run, options, consumed, segments, index);
}

fn close_run(
    run: &mut Vec<(u32, u32)>,
    options: &SegmentOptions,
    consumed: &mut [bool],
    segments: &mut Vec<PixelSegment>,
    index: impl Fn((u32, u32)) -> usize,
) {
    if let (Some(&start), Some(&end)) = (run.first(), run.last()) {
        let segment = PixelSegment { start, end };
        if segment.extent() >= options.line_length {
            for &pixel in run.iter() {
                consumed[index(pixel)] = true;
            }
            segments.push(segment);
        }
    }
    run.clear();
}

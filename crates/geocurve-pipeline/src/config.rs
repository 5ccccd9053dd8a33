//! Validated configuration for the detection drivers.
//!
//! Every struct has a [`Default`] impl and serde support so the CLI can
//! accept a JSON override. Trend-line parameters are validated on
//! construction and on deserialization; the grid drivers validate when
//! they run.

use serde::{Deserialize, Serialize};

use crate::types::CurveError;

/// Keep only edges aligned with a target azimuth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AzimuthFilter {
    /// Target direction in degrees, clockwise from north.
    pub azimuth: f64,
    /// Allowed deviation in degrees, either way along the line.
    pub tolerance: f64,
}

impl AzimuthFilter {
    /// Create a filter.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] if either value is not
    /// finite or the tolerance is negative.
    pub fn try_new(azimuth: f64, tolerance: f64) -> Result<Self, CurveError> {
        let filter = Self { azimuth, tolerance };
        filter.validate()?;
        Ok(filter)
    }

    /// Check the filter invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] on a non-finite azimuth or a
    /// negative / non-finite tolerance.
    pub fn validate(&self) -> Result<(), CurveError> {
        if !self.azimuth.is_finite() {
            return Err(CurveError::InvalidConfig(format!(
                "azimuth must be finite, got {}",
                self.azimuth
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(CurveError::InvalidConfig(format!(
                "azimuth tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Unit vector pointing at the azimuth, `(sin az, cos az)`.
    #[must_use]
    pub fn direction(&self) -> (f64, f64) {
        let radians = self.azimuth.to_radians();
        (radians.sin(), radians.cos())
    }
}

/// Parameters of the trend-line search.
///
/// Serialized flat: `azimuth` and `azimuth_tol` must be given together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DetectionParams", into = "DetectionParams")]
pub struct DetectionConfig {
    /// Minimum number of edges a path needs to be kept.
    pub min_edges: usize,

    /// Drop candidate edges longer than this.
    pub max_distance: Option<f64>,

    /// Weight between straightness and proximity, in `[0, 1]`.
    ///
    /// `0` scores a continuation by `angle * length`; `1` ignores the
    /// angle and picks the nearest forward neighbour.
    pub damping: f64,

    /// Optional orientation filter on candidate edges.
    pub azimuth: Option<AzimuthFilter>,
}

impl DetectionConfig {
    /// Default minimum path length in edges.
    pub const DEFAULT_MIN_EDGES: usize = 1;
    /// Default damping.
    pub const DEFAULT_DAMPING: f64 = 0.0;

    /// Create a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] if any parameter is out of
    /// range; see [`DetectionConfig::validate`].
    pub fn try_new(
        min_edges: usize,
        max_distance: Option<f64>,
        damping: f64,
        azimuth: Option<AzimuthFilter>,
    ) -> Result<Self, CurveError> {
        let config = Self {
            min_edges,
            max_distance,
            damping,
            azimuth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check all invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] when `min_edges` is zero,
    /// `max_distance` is not a positive finite number, `damping` lies
    /// outside `[0, 1]`, or the azimuth filter is invalid.
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.min_edges == 0 {
            return Err(CurveError::InvalidConfig(
                "min_edges must be at least 1".to_string(),
            ));
        }
        if let Some(max_distance) = self.max_distance
            && !(max_distance.is_finite() && max_distance > 0.0)
        {
            return Err(CurveError::InvalidConfig(format!(
                "max_distance must be positive and finite, got {max_distance}"
            )));
        }
        validate_damping(self.damping)?;
        if let Some(filter) = &self.azimuth {
            filter.validate()?;
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_edges: Self::DEFAULT_MIN_EDGES,
            max_distance: None,
            damping: Self::DEFAULT_DAMPING,
            azimuth: None,
        }
    }
}

/// Reject damping values outside `[0, 1]`.
pub(crate) fn validate_damping(damping: f64) -> Result<(), CurveError> {
    if (0.0..=1.0).contains(&damping) {
        Ok(())
    } else {
        Err(CurveError::InvalidConfig(format!(
            "damping must be between 0 and 1, got {damping}"
        )))
    }
}

/// Flat wire form of [`DetectionConfig`].
#[derive(Serialize, Deserialize)]
struct DetectionParams {
    #[serde(default = "default_min_edges")]
    min_edges: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_distance: Option<f64>,
    #[serde(default)]
    damping: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azimuth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azimuth_tol: Option<f64>,
}

const fn default_min_edges() -> usize {
    DetectionConfig::DEFAULT_MIN_EDGES
}

impl TryFrom<DetectionParams> for DetectionConfig {
    type Error = CurveError;

    fn try_from(params: DetectionParams) -> Result<Self, Self::Error> {
        let azimuth = match (params.azimuth, params.azimuth_tol) {
            (Some(azimuth), Some(tolerance)) => Some(AzimuthFilter { azimuth, tolerance }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(CurveError::InvalidConfig(
                    "azimuth given without azimuth_tol".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(CurveError::InvalidConfig(
                    "azimuth_tol given without azimuth".to_string(),
                ));
            }
        };
        Self::try_new(params.min_edges, params.max_distance, params.damping, azimuth)
    }
}

impl From<DetectionConfig> for DetectionParams {
    fn from(config: DetectionConfig) -> Self {
        Self {
            min_edges: config.min_edges,
            max_distance: config.max_distance,
            damping: config.damping,
            azimuth: config.azimuth.map(|f| f.azimuth),
            azimuth_tol: config.azimuth.map(|f| f.tolerance),
        }
    }
}

/// Parameters of the edge detection driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDetectionConfig {
    /// Minimum accepted segment length in pixels.
    pub line_length: u32,

    /// Maximum gap in pixels bridged within one segment.
    pub line_gap: u32,

    /// Gaussian blur sigma applied before Canny.
    pub sigma: f32,

    /// Minimum number of Hough votes for a line.
    pub threshold: u32,

    /// Tile width in pixels; the whole raster when `None`.
    pub window_size: Option<u32>,

    /// Merge segment endpoints closer than this world distance.
    pub merge_length: Option<f64>,

    /// Canny low threshold, as a quantile of the gradient magnitude in
    /// `[0, 1]`.
    pub canny_low: f32,

    /// Canny high threshold, as a quantile of the gradient magnitude in
    /// `[0, 1]`.
    pub canny_high: f32,
}

impl EdgeDetectionConfig {
    /// Default minimum segment length.
    pub const DEFAULT_LINE_LENGTH: u32 = 1;
    /// Default maximum gap.
    pub const DEFAULT_LINE_GAP: u32 = 1;
    /// Default blur sigma.
    pub const DEFAULT_SIGMA: f32 = 10.0;
    /// Default Hough vote threshold.
    pub const DEFAULT_THRESHOLD: u32 = 1;
    /// Default Canny low quantile.
    pub const DEFAULT_CANNY_LOW: f32 = 0.1;
    /// Default Canny high quantile.
    pub const DEFAULT_CANNY_HIGH: f32 = 0.2;

    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] for a zero line length, a
    /// non-positive sigma, a zero window, a non-positive merge length, or
    /// Canny quantiles outside `[0, 1]` or out of order.
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.line_length == 0 {
            return Err(CurveError::InvalidConfig(
                "line_length must be at least 1".to_string(),
            ));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(CurveError::InvalidConfig(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if self.window_size == Some(0) {
            return Err(CurveError::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        if let Some(merge) = self.merge_length
            && !(merge.is_finite() && merge > 0.0)
        {
            return Err(CurveError::InvalidConfig(format!(
                "merge_length must be positive, got {merge}"
            )));
        }
        let quantiles = 0.0..=1.0;
        if !(quantiles.contains(&self.canny_low)
            && quantiles.contains(&self.canny_high)
            && self.canny_low <= self.canny_high)
        {
            return Err(CurveError::InvalidConfig(format!(
                "canny quantiles must satisfy 0 <= low <= high <= 1, got {} and {}",
                self.canny_low, self.canny_high
            )));
        }
        Ok(())
    }
}

impl Default for EdgeDetectionConfig {
    fn default() -> Self {
        Self {
            line_length: Self::DEFAULT_LINE_LENGTH,
            line_gap: Self::DEFAULT_LINE_GAP,
            sigma: Self::DEFAULT_SIGMA,
            threshold: Self::DEFAULT_THRESHOLD,
            window_size: None,
            merge_length: None,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
        }
    }
}

/// Levels traced by the contour driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// First interval level.
    pub interval_min: Option<f64>,
    /// Upper bound of the interval levels (inclusive).
    pub interval_max: Option<f64>,
    /// Step between interval levels.
    pub interval_spacing: Option<f64>,
    /// Extra levels traced after the intervals.
    pub fixed_contours: Vec<f64>,
}

impl ContourConfig {
    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidConfig`] for a non-positive or
    /// non-finite spacing, or non-finite bounds and levels.
    pub fn validate(&self) -> Result<(), CurveError> {
        if let Some(spacing) = self.interval_spacing
            && !(spacing.is_finite() && spacing > 0.0)
        {
            return Err(CurveError::InvalidConfig(format!(
                "interval_spacing must be positive, got {spacing}"
            )));
        }
        let bounds = [self.interval_min, self.interval_max];
        if bounds.iter().flatten().chain(&self.fixed_contours).any(|v| !v.is_finite()) {
            return Err(CurveError::InvalidConfig(
                "contour levels must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// All levels to trace: the interval levels followed by the fixed ones.
    ///
    /// Interval levels are produced only when min, max and a non-zero
    /// spacing are all set.
    #[must_use]
    pub fn levels(&self) -> Vec<f64> {
        let mut levels = Vec::new();
        if let (Some(min), Some(max), Some(spacing)) =
            (self.interval_min, self.interval_max, self.interval_spacing)
            && spacing > 0.0
        {
            let mut k = 0.0_f64;
            loop {
                let level = k.mul_add(spacing, min);
                if level > max {
                    break;
                }
                levels.push(level);
                k += 1.0;
            }
        }
        levels.extend_from_slice(&self.fixed_contours);
        levels
    }
}

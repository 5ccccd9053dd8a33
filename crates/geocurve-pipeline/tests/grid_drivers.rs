//! Edge and contour detection on a rotated, georeferenced grid.

#![allow(clippy::unwrap_used)]

use geocurve_pipeline::{
    ContourConfig, CurveError, DataValues, EdgeDetectionConfig, Grid2D, GridData, Point,
    detect_contours, detect_edges,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rotated_grid(size: u32) -> Grid2D {
    Grid2D {
        origin: Point::new(500_000.0, 6_000_000.0),
        u_cell_size: 25.0,
        v_cell_size: 25.0,
        u_count: size,
        v_count: size,
        rotation: 30.0,
    }
}

/// Plateau in the middle third of u, with a strip of missing data.
fn plateau() -> GridData {
    let grid = rotated_grid(48);
    let mut values = Vec::with_capacity(grid.cell_count());
    for v in 0..grid.v_count {
        for u in 0..grid.u_count {
            let value = if v >= 44 {
                f64::NAN
            } else if (16..32).contains(&u) {
                250.0
            } else {
                10.0
            };
            values.push(value);
        }
    }
    GridData::new(grid, values).unwrap()
}

#[test]
fn edges_follow_plateau_sides() {
    init_logger();
    let source = plateau();
    let config = EdgeDetectionConfig {
        sigma: 1.0,
        threshold: 10,
        line_length: 5,
        ..EdgeDetectionConfig::default()
    };
    let set = detect_edges(&source, &config).unwrap().unwrap();
    assert!(set.cell_count() >= 2);

    // The plateau sides run along v, i.e. 30 degrees west of north once the
    // grid is rotated: azimuth 150 after folding into [0, 180].
    let azimuth = match set.data.get("azimuth") {
        Some(DataValues::Float(values)) => values.clone(),
        _ => Vec::new(),
    };
    assert_eq!(azimuth.len(), set.vertex_count());
    let along_v = azimuth
        .iter()
        .filter(|a| (**a - 150.0).abs() < 10.0)
        .count();
    assert!(along_v > 0, "azimuths: {azimuth:?}");
    assert!(set.data.contains_key("lengths"));
}

#[test]
fn default_edge_config_finds_plateau() {
    init_logger();
    let set = detect_edges(&plateau(), &EdgeDetectionConfig::default())
        .unwrap()
        .unwrap();
    assert!(set.cell_count() > 0);
}

#[test]
fn contours_follow_plateau_sides() {
    init_logger();
    let source = plateau();
    let config = ContourConfig {
        fixed_contours: vec![100.0],
        ..ContourConfig::default()
    };
    let set = detect_contours(&source, &config).unwrap();
    // One open line down each side of the plateau, stopping at the rows
    // without data: 44 crossings joined by 43 cells each.
    assert_eq!(set.vertex_count(), 88);
    assert_eq!(set.cell_count(), 86);
    for vertex in &set.vertices {
        assert!(vertex.x > 499_000.0 && vertex.y > 6_000_000.0);
    }
}

#[test]
fn contour_levels_outside_data_fail() {
    init_logger();
    let config = ContourConfig {
        interval_min: Some(1_000.0),
        interval_max: Some(2_000.0),
        interval_spacing: Some(100.0),
        fixed_contours: Vec::new(),
    };
    assert!(matches!(
        detect_contours(&plateau(), &config),
        Err(CurveError::NoContours)
    ));
}

#[test]
fn grid_json_round_trip_keeps_missing_values() {
    let source = plateau();
    let json = serde_json::to_string(&source).unwrap();
    let back: GridData = serde_json::from_str(&json).unwrap();
    assert_eq!(back.grid, source.grid);
    assert_eq!(
        back.values.iter().filter(|v| v.is_nan()).count(),
        source.values.iter().filter(|v| v.is_nan()).count()
    );
}

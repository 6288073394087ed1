//! In-memory run through the umbrella crate: volume to graph metrics

use approx::assert_abs_diff_eq;
use ndarray::{Array3, Array4};
use neurograph::io::RegionLabel;
use neurograph::prelude::*;

/// Three regions along x; regions 0 and 2 share a slow oscillation
fn synthetic_run() -> (Array4<f32>, Array3<u32>, Vec<RegionLabel>) {
    let data = Array4::from_shape_fn((6, 3, 3, 90), |(x, y, _, t)| {
        let time = t as f32 * 2.0;
        let slow = (2.0 * std::f32::consts::PI * 0.04 * time).sin();
        let fast = (2.0 * std::f32::consts::PI * 0.08 * time).cos();
        let signal = match x / 2 {
            0 => slow,
            1 => fast,
            _ => slow + 0.1 * fast,
        };
        200.0 + 0.5 * t as f32 + 5.0 * signal + 0.01 * y as f32
    });
    let labels = Array3::from_shape_fn((6, 3, 3), |(x, _, _)| (x / 2 + 1) as u32);
    let regions = vec![
        RegionLabel::new(1, "Frontal Pole"),
        RegionLabel::new(2, "Insular Cortex"),
        RegionLabel::new(3, "Precentral Gyrus"),
    ];
    (data, labels, regions)
}

#[test]
fn test_volume_to_metrics() {
    let (mut data, labels, regions) = synthetic_run();
    clean_volume(&mut data, &CleanOptions::default()).unwrap();

    let ts = extract_region_signals(&data, &labels, &regions, true).unwrap();
    assert_eq!(ts.n_regions(), 3);

    let r = correlation_matrix(&ts.data).unwrap();
    assert!(r[[0, 2]] > 0.9);
    assert!(r[[0, 1]].abs() < 0.3);

    let z = fisher_z(&r, DEFAULT_CLIP).unwrap();
    assert!(check_connectivity(&z).passed());

    // One of three possible edges survives: the shared oscillation
    let graph = threshold(&z, ThresholdMode::Proportional { density: 0.34 }, false).unwrap();
    assert!(graph.has_edge(0, 2));
    assert_eq!(graph.edge_count(), 1);

    let metrics = compute_metrics(&graph);
    assert_eq!(metrics.degree, vec![1, 0, 1]);
    assert_abs_diff_eq!(metrics.global.density, 1.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn test_default_config_matches_cleaning_defaults() {
    let config = NeurographConfig::default();
    assert_eq!(config.preprocessing.t_r, CleanOptions::default().t_r);
    assert_eq!(config.preprocessing.filter_order, CleanOptions::default().filter_order);
}

//! Whole-pipeline run on a synthetic study
//!
//! Builds a phenotypic table, raw BOLD runs and an atlas in a temporary data
//! directory, runs every stage plus the group comparison, and checks the
//! files each stage leaves behind.

use ndarray::Array4;
use neurograph_config::NeurographConfig;
use neurograph_io::{read_labels, read_npy, write_labels, write_nifti, NiftiHeader, NiftiImage, RegionLabel, RunLog};
use neurograph_pipeline::{
    run_pipeline, BatchRunner, Cohort, Group, PipelineContext, Stage, SubjectMetrics,
};
use std::f32::consts::PI;
use std::path::Path;

const SHAPE: [usize; 4] = [8, 4, 4, 100];
const VOXEL_MM: f32 = 3.0;
const TR: f32 = 2.0;

/// Slab-wise signals in the 0.01-0.1 Hz band; `coupling` mixes slab 0 into slab 1
fn write_bold(path: &Path, coupling: f32, seed: f32) {
    let freqs = [0.03f32, 0.05, 0.07, 0.09];
    let data = Array4::from_shape_fn((SHAPE[0], SHAPE[1], SHAPE[2], SHAPE[3]), |(x, y, z, t)| {
        let time = t as f32 * TR;
        let slab = x / 2;
        let own = (2.0 * PI * freqs[slab] * time + seed).sin();
        let shared = (2.0 * PI * freqs[0] * time + seed).sin();
        let signal = if slab == 1 { own + coupling * shared } else { own };
        500.0 + 0.2 * t as f32 + 10.0 * signal + 0.01 * (y + z) as f32
    });
    let header = NiftiHeader::new(SHAPE, [VOXEL_MM; 3], TR);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_nifti(path, &NiftiImage::from_array(data, &header)).unwrap();
}

fn write_atlas(img_path: &Path, labels_path: &Path) {
    let data = Array4::from_shape_fn((SHAPE[0], SHAPE[1], SHAPE[2], 1), |(x, _, _, _)| (x / 2 + 1) as f32);
    let header = NiftiHeader::new([SHAPE[0], SHAPE[1], SHAPE[2], 1], [VOXEL_MM; 3], 0.0);
    std::fs::create_dir_all(img_path.parent().unwrap()).unwrap();
    write_nifti(img_path, &NiftiImage::from_array(data, &header)).unwrap();
    write_labels(
        labels_path,
        &[
            RegionLabel::new(0, "Background"),
            RegionLabel::new(1, "Frontal Pole"),
            RegionLabel::new(2, "Insular Cortex"),
            RegionLabel::new(3, "Superior Frontal Gyrus"),
            RegionLabel::new(4, "Middle Frontal Gyrus"),
        ],
    )
    .unwrap();
}

fn setup(root: &Path) -> PipelineContext {
    let mut config = NeurographConfig::default();
    config.paths.data_dir = root.join("data");
    config.paths.results_dir = root.join("results");
    config.paths.figures_dir = root.join("results").join("figures");
    config.system.max_cores = 2;
    config.statistics.permutations = 99;
    config.connectivity.save_figures = true;
    let ctx = PipelineContext::new(config);

    let pheno = ctx.layout.phenotypic_file().to_path_buf();
    std::fs::create_dir_all(pheno.parent().unwrap()).unwrap();
    std::fs::write(
        &pheno,
        "ScanDir ID,Site,Gender,Age,DX,ADHD Index\n\
         10001,5,1,9.1,0,45\n\
         10002,5,0,10.4,1,52\n\
         10003,5,1,11.2,1,65\n\
         10004,5,1,8.7,1,70\n\
         10005,5,0,12.0,0,30\n\
         10006,5,1,9.9,1,-999\n\
         10007,5,0,10.0,1,55\n",
    )
    .unwrap();

    // sub-0010007 is in the analysis groups but has no scan
    for (subject, coupling, seed) in [
        ("sub-0010001", 0.2, 0.0),
        ("sub-0010002", 0.4, 0.5),
        ("sub-0010003", 1.5, 1.0),
        ("sub-0010004", 2.0, 1.5),
    ] {
        write_bold(&ctx.layout.raw_bold(subject), coupling, seed);
    }
    write_atlas(ctx.layout.atlas_path(), ctx.layout.atlas_labels_path());
    ctx
}

#[test]
fn test_full_run_on_synthetic_study() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = setup(dir.path());
    let runner = BatchRunner::from_config(&ctx.config).unwrap();

    let run = run_pipeline(&ctx, &runner, false).unwrap();
    assert_eq!(run.outcomes.len(), 4);

    let preprocess = &run.outcomes[0];
    assert_eq!(preprocess.stage, Stage::Preprocess);
    assert_eq!(
        preprocess.successful,
        vec!["sub-0010001", "sub-0010002", "sub-0010003", "sub-0010004"]
    );
    assert_eq!(preprocess.failed, vec!["sub-0010007"]);
    let failed = std::fs::read_to_string(ctx.layout.failed_subjects()).unwrap();
    assert_eq!(failed, "Failed Subjects\nsub-0010007\n");

    for outcome in &run.outcomes[1..] {
        assert_eq!(outcome.successful.len(), 4, "{:?}", outcome.errors);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.verify_outputs().files, 4);
    }

    let extraction_log = RunLog::read(&ctx.layout.run_log(Stage::Extract)).unwrap();
    assert_eq!(extraction_log.get("Atlas"), Some("Harvard-Oxford Cortical"));
    assert_eq!(extraction_log.get("Total subjects"), Some("4"));
    let labels = read_labels(&ctx.layout.timeseries_labels()).unwrap();
    assert_eq!(labels.len(), 4);

    let conn_log = RunLog::read(&ctx.layout.run_log(Stage::Connectivity)).unwrap();
    assert_eq!(
        conn_log.get("Matrix size"),
        Some("4x4 (Harvard-Oxford Cortical)")
    );
    let z = read_npy(&ctx.layout.connectivity("sub-0010003")).unwrap();
    assert_eq!(z.dim(), (4, 4));
    assert!(ctx.layout.figure("sub-0010003").exists());

    let metrics = SubjectMetrics::read(&ctx.layout.metrics("sub-0010001")).unwrap();
    assert_eq!(metrics.regions[0], "Frontal Pole");
    assert_eq!(metrics.metrics.n_nodes, 4);

    let summary = std::fs::read_to_string(ctx.layout.sample_summary()).unwrap();
    assert!(summary.contains("Total subjects: 7"));
    assert!(summary.contains("Valid ADHD scores: 6"));

    let comparison = run.comparison.expect("both groups have metrics");
    assert_eq!(comparison.subthreshold_subjects, vec!["sub-0010001", "sub-0010002"]);
    assert_eq!(comparison.diagnosed_subjects, vec!["sub-0010003", "sub-0010004"]);
    assert_eq!(comparison.metrics.len(), 9);
    for m in &comparison.metrics {
        assert!(m.test.p_value > 0.0 && m.test.p_value <= 1.0);
        assert!(m.p_fdr >= m.test.p_value - 1e-12);
    }
    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ctx.layout.group_comparison_json()).unwrap(),
    )
    .unwrap();
    assert_eq!(json["metrics"].as_array().unwrap().len(), 9);
    assert!(ctx.layout.group_comparison_table().exists());
}

#[test]
fn test_stages_rerun_from_logs() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = setup(dir.path());
    let runner = BatchRunner::new(1, 1).unwrap();

    let cohort = Cohort::load(ctx.layout.phenotypic_file(), &ctx.config.cohort).unwrap();
    assert_eq!(cohort.group_of("sub-0010006"), Some(Group::Unknown));
    assert_eq!(cohort.analysis_subjects().len(), 5);

    // Extraction before preprocessing has no log to read
    assert!(neurograph_pipeline::run_stage(&ctx, &runner, Stage::Extract, false).is_err());

    let first = neurograph_pipeline::run_stage(&ctx, &runner, Stage::Preprocess, false).unwrap();
    assert_eq!(first.successful.len(), 4);
    let extract = neurograph_pipeline::run_stage(&ctx, &runner, Stage::Extract, false).unwrap();
    assert_eq!(extract.successful, first.successful);
}

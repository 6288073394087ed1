//! File format tests across modules
//!
//! Writes a small preprocessed-style volume, a time series matrix and the
//! bookkeeping files a batch stage produces, then reads them back the way a
//! downstream stage would.

use ndarray::{Array2, Array4};
use neurograph_io::{
    read_labels, read_nifti, read_npy, read_successful_subjects, write_labels, write_nifti,
    write_npy, NiftiHeader, NiftiImage, RegionLabel, RunLog,
};

fn bold_image() -> NiftiImage {
    let data = Array4::from_shape_fn((4, 5, 3, 6), |(x, y, z, t)| {
        (x as f32) * 0.5 - (y as f32) + (z as f32) * 2.0 + (t as f32) * 0.25
    });
    NiftiImage::from_array(data, &NiftiHeader::new([4, 5, 3, 6], [3.0, 3.0, 4.0], 2.0))
}

#[test]
fn test_gzipped_bold_keeps_grid_and_timing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("sub-0010001")
        .join("ses-1")
        .join("func")
        .join("sub-0010001_ses-1_task-rest_run-1_bold_preprocessed.nii.gz");
    let image = bold_image();
    write_nifti(&path, &image).unwrap();

    let loaded = read_nifti(&path).unwrap();
    assert_eq!(loaded.shape(), [4, 5, 3, 6]);
    assert_eq!(loaded.n_timepoints(), 6);
    assert_eq!(loaded.header.repetition_time(), Some(2.0));
    assert_eq!(loaded.header.voxel_sizes(), [3.0, 3.0, 4.0]);
    assert_eq!(loaded.data, image.data);
    assert_eq!(loaded.volume(3)[[1, 2, 0]], image.data[[1, 2, 0, 3]]);
}

#[test]
fn test_timeseries_and_labels_line_up() {
    let dir = tempfile::tempdir().unwrap();
    let ts_path = dir.path().join("timeseries").join("sub-0010001_timeseries.npy");
    let labels_path = dir.path().join("timeseries").join("atlas_labels.txt");

    let ts = Array2::from_shape_fn((6, 3), |(t, r)| t as f64 - r as f64 * 0.1);
    let labels = vec![
        RegionLabel::new(1, "Frontal Pole"),
        RegionLabel::new(2, "Insular Cortex"),
        RegionLabel::new(4, "Superior Frontal Gyrus"),
    ];
    write_npy(&ts_path, &ts).unwrap();
    write_labels(&labels_path, &labels).unwrap();

    let loaded = read_npy(&ts_path).unwrap();
    let loaded_labels = read_labels(&labels_path).unwrap();
    assert_eq!(loaded, ts);
    assert_eq!(loaded.ncols(), loaded_labels.len());
    assert_eq!(loaded_labels, labels);
}

#[test]
fn test_next_stage_reads_previous_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("logs").join("preprocessing_log.txt");

    let mut log = RunLog::new("PREPROCESSING LOG")
        .field("Total subjects", 3)
        .field("Successful", 2)
        .field("Failed", 1);
    log.successful = vec!["sub-0010001".into(), "sub-0010002".into()];
    log.failed = vec!["sub-0010003".into()];
    log.write(&log_path).unwrap();

    assert_eq!(
        read_successful_subjects(&log_path).unwrap(),
        vec!["sub-0010001", "sub-0010002"]
    );
    let reread = RunLog::read(&log_path).unwrap();
    assert_eq!(reread.get("Failed"), Some("1"));
}

#[test]
fn test_missing_files_report_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.nii.gz");
    let err = read_nifti(&missing).unwrap_err();
    assert!(err.to_string().contains("nope.nii.gz"));
}

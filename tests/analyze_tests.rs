mod common;

use common::{binary_run, csv_rows, observations, text_run, BACKTRACE, DESCRIPTOR_A, DESCRIPTOR_B, TRACE};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use veritrace_analyze::commands::{execute_analyze, validate_args, AnalyzeArgs, AnalyzeConfig};
use veritrace_analyze::output::{read_report, with_suffix};
use veritrace_analyze::partition::parse_descriptor;
use veritrace_analyze::utils::{AnalyzeError, DecodeError, PartitionError, SliceError, StatsError};

fn config(prefix_dir: &Path, output: PathBuf, read_per_bytes: &str) -> AnalyzeConfig {
    validate_args(&AnalyzeArgs {
        prefix_dir: prefix_dir.to_path_buf(),
        output_prefix: output,
        read_per_bytes: read_per_bytes.to_string(),
        workers: Some(3),
        ..Default::default()
    })
    .unwrap()
}

fn signature(descriptor: &str) -> String {
    parse_descriptor(descriptor).unwrap().signature()
}

fn wavy(run: usize, len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| (i as f64).sin() * 100.0 + run as f64 * 1e-6 * i as f64)
        .collect()
}

#[test]
fn test_identical_runs_keep_every_digit() {
    let root = TempDir::new().unwrap();
    for r in 0..3 {
        binary_run(root.path(), &format!("run{}", r), DESCRIPTOR_A, &observations(&[1.0, 0.5]));
    }

    let config = config(root.path(), PathBuf::from("veritracer"), "0");
    let report = execute_analyze(&config).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.failed_groups(), 0);
    let group = &report.groups[0];
    assert_eq!(group.runs, 3);
    assert_eq!(group.rows, 2);

    let output = root.path().join(format!("veritracer.{}", signature(DESCRIPTOR_A)));
    assert_eq!(group.output.as_deref(), Some(output.as_path()));

    let content = fs::read_to_string(&output).unwrap();
    assert_eq!(
        content.lines().next().unwrap(),
        "hash,type,time,max,min,median,mean,std,significant_digit_number"
    );
    let rows = csv_rows(&output);
    assert_eq!(
        rows[0][..8].to_vec(),
        vec!["11", "8", "1000", "1.0", "1.0", "1.0", "1.0", "0.0"]
    );
    let sdn: f64 = rows[0][8].parse().unwrap();
    assert!((sdn - 52.0 * 2f64.log10()).abs() < 1e-12);
    assert_eq!(rows[1][0], "12");
}

#[test]
fn test_sliced_output_matches_single_pass() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    for r in 0..4 {
        binary_run(root.path(), &format!("run{}", r), DESCRIPTOR_A, &observations(&wavy(r, 97)));
    }

    let single = execute_analyze(&config(root.path(), out.path().join("single"), "0")).unwrap();
    let sliced = execute_analyze(&config(root.path(), out.path().join("sliced"), "1K")).unwrap();

    assert_eq!(single.groups[0].slices, 1);
    assert!(sliced.groups[0].slices > 1);

    let sig = signature(DESCRIPTOR_A);
    let single_bytes = fs::read(with_suffix(&out.path().join("single"), &sig)).unwrap();
    let sliced_bytes = fs::read(with_suffix(&out.path().join("sliced"), &sig)).unwrap();
    assert_eq!(single_bytes, sliced_bytes);

    // No partial file is left behind
    let leftovers: Vec<_> = fs::read_dir(out.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 2);
}

#[test]
fn test_repeated_invocation_is_identical() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    for r in 0..3 {
        binary_run(root.path(), &format!("run{}", r), DESCRIPTOR_A, &observations(&wavy(r, 40)));
    }
    let config = config(root.path(), out.path().join("result"), "512");
    let output = with_suffix(&out.path().join("result"), signature(DESCRIPTOR_A));

    execute_analyze(&config).unwrap();
    let first = fs::read(&output).unwrap();
    execute_analyze(&config).unwrap();
    let second = fs::read(&output).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_text_and_binary_give_same_results() {
    let binary_root = TempDir::new().unwrap();
    let text_root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    for r in 0..3 {
        let values = observations(&wavy(r, 25));
        binary_run(binary_root.path(), &format!("run{}", r), DESCRIPTOR_A, &values);
        text_run(text_root.path(), &format!("run{}", r), DESCRIPTOR_A, &values);
    }

    execute_analyze(&config(binary_root.path(), out.path().join("bin"), "0")).unwrap();
    let text_config = validate_args(&AnalyzeArgs {
        prefix_dir: text_root.path().to_path_buf(),
        output_prefix: out.path().join("txt"),
        read_per_bytes: "256".to_string(),
        encoding: "text".to_string(),
        workers: Some(2),
        ..Default::default()
    })
    .unwrap();
    let report = execute_analyze(&text_config).unwrap();
    assert!(report.groups[0].slices > 1);

    let sig = signature(DESCRIPTOR_A);
    assert_eq!(
        fs::read_to_string(with_suffix(&out.path().join("txt"), &sig)).unwrap(),
        fs::read_to_string(with_suffix(&out.path().join("bin"), &sig)).unwrap()
    );
}

#[test]
fn test_runs_split_by_backtrace() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0, 2.0]));
    binary_run(root.path(), "run1", DESCRIPTOR_A, &observations(&[1.0, 2.0]));
    binary_run(root.path(), "run2", DESCRIPTOR_B, &observations(&[5.0]));

    let report = execute_analyze(&config(root.path(), out.path().join("v"), "0")).unwrap();

    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.total_rows(), 3);
    assert!(with_suffix(&out.path().join("v"), signature(DESCRIPTOR_A)).is_file());
    assert!(with_suffix(&out.path().join("v"), signature(DESCRIPTOR_B)).is_file());
}

#[test]
fn test_run_without_trace_is_excluded() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0]));
    binary_run(root.path(), "run1", DESCRIPTOR_A, &observations(&[3.0]));
    let missing = binary_run(root.path(), "run2", DESCRIPTOR_A, &observations(&[100.0]));
    fs::remove_file(missing.join(TRACE)).unwrap();

    let report = execute_analyze(&config(root.path(), out.path().join("v"), "0")).unwrap();

    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].dir, missing);
    assert_eq!(report.groups[0].runs, 2);
    let rows = csv_rows(&with_suffix(&out.path().join("v"), signature(DESCRIPTOR_A)));
    assert_eq!(rows[0][6], "2.0");
}

#[test]
fn test_empty_trace_is_excluded() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0]));
    let empty = binary_run(root.path(), "run1", DESCRIPTOR_A, &[]);

    let report = execute_analyze(&config(root.path(), out.path().join("v"), "0")).unwrap();

    assert_eq!(report.groups[0].runs, 1);
    assert_eq!(report.groups[0].excluded.len(), 1);
    assert_eq!(report.groups[0].excluded[0].dir, empty);
}

#[test]
fn test_missing_backtrace_aborts() {
    let root = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0]));
    let run1 = binary_run(root.path(), "run1", DESCRIPTOR_A, &observations(&[1.0]));
    fs::remove_file(run1.join(BACKTRACE)).unwrap();

    let err = execute_analyze(&config(root.path(), PathBuf::from("v"), "0")).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::Partition(PartitionError::BacktraceFileNoExist(_))
    ));
}

#[test]
fn test_all_empty_backtraces_abort() {
    let root = TempDir::new().unwrap();
    binary_run(root.path(), "run0", "", &observations(&[1.0]));
    binary_run(root.path(), "run1", "", &observations(&[1.0]));

    let err = execute_analyze(&config(root.path(), PathBuf::from("v"), "0")).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::Partition(PartitionError::AllEmptyFile(_))
    ));
}

#[test]
fn test_no_run_directory_aborts() {
    let root = TempDir::new().unwrap();
    let err = execute_analyze(&config(root.path(), PathBuf::from("v"), "0")).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::Partition(PartitionError::NoRunDirectories)
    ));
}

#[test]
fn test_unequal_binary_traces_abort() {
    let root = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0, 2.0]));
    binary_run(root.path(), "run1", DESCRIPTOR_A, &observations(&[1.0]));

    let err = execute_analyze(&config(root.path(), PathBuf::from("v"), "0")).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::Slice(SliceError::InconsistentTraceSize { .. })
    ));
}

#[test]
fn test_data_checking_rejects_misaligned_runs() {
    let root = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0, 2.0]));
    let mut shifted = observations(&[1.0, 2.0]);
    shifted.swap(0, 1);
    binary_run(root.path(), "run1", DESCRIPTOR_A, &shifted);

    // Without checking the rows are computed anyway
    let out = TempDir::new().unwrap();
    assert!(execute_analyze(&config(root.path(), out.path().join("v"), "0")).is_ok());

    let mut checked = config(root.path(), out.path().join("w"), "0");
    checked.stats.data_checking = true;
    let err = execute_analyze(&checked).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::Stats(StatsError::Consistency { position: 0, .. })
    ));
}

#[test]
fn test_output_failure_only_costs_its_group() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0]));
    binary_run(root.path(), "run1", DESCRIPTOR_B, &observations(&[2.0]));

    // A directory squatting on group A's partial file
    let prefix = out.path().join("v");
    let blocked = with_suffix(&prefix, signature(DESCRIPTOR_A));
    fs::create_dir_all(with_suffix(&blocked, 0)).unwrap();

    let report = execute_analyze(&config(root.path(), prefix.clone(), "0")).unwrap();

    assert_eq!(report.failed_groups(), 1);
    let failed = report
        .groups
        .iter()
        .find(|g| g.signature == signature(DESCRIPTOR_A))
        .unwrap();
    assert!(failed.error.is_some());
    assert!(failed.output.is_none());
    assert!(!blocked.exists());
    assert!(with_suffix(&prefix, signature(DESCRIPTOR_B)).is_file());
}

#[test]
fn test_report_written() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    binary_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0, 2.0]));
    binary_run(root.path(), "run1", DESCRIPTOR_A, &observations(&[1.5, 2.5]));

    let mut config = config(root.path(), out.path().join("v"), "0");
    let report_path = out.path().join("reports/analysis.json");
    config.report = Some(report_path.clone());

    let report = execute_analyze(&config).unwrap();
    let loaded = read_report(&report_path).unwrap();

    assert_eq!(loaded.groups, report.groups);
    assert_eq!(loaded.generated_at, report.generated_at);
    assert_eq!(loaded.encoding, "binary");
    assert_eq!(loaded.workers, 3);
    assert_eq!(loaded.total_rows(), 2);
}

#[test]
fn test_text_trace_with_invalid_utf8_aborts() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    text_run(root.path(), "run0", DESCRIPTOR_A, &observations(&[1.0, 2.0, 3.0]));
    let corrupt = text_run(root.path(), "run1", DESCRIPTOR_A, &observations(&[1.0, 2.0]));
    let mut bytes = fs::read(corrupt.join(TRACE)).unwrap();
    bytes.extend_from_slice(b"binary64 1002 11 (nil) 0x1\xffp+0\n");
    fs::write(corrupt.join(TRACE), bytes).unwrap();

    let mut config = config(root.path(), out.path().join("v"), "0");
    config.encoding = "text".parse().unwrap();
    let err = execute_analyze(&config).unwrap_err();

    assert!(matches!(
        err,
        AnalyzeError::Decode(DecodeError::Format { record: 2, .. })
    ));
}

//! Truncated-input behavior: soft zeros, opt-in recovery, header failures

use sdf::{
    DataMode, ReadOutcome, ScalarType, SdfConfig, SdfError, SdfReader, SdfWriter,
};
use std::path::{Path, PathBuf};

/// Two binary pages of 4 rows each, then the file is cut `cut_back` bytes
/// short so the second page ends mid-row
fn truncated_file(dir: &Path, cut_back: usize) -> PathBuf {
    let path = dir.join("cut.sdf");
    let mut out = SdfWriter::create(&path, DataMode::binary(), None, None).unwrap();
    out.define_simple_parameter("t", None, ScalarType::F64).unwrap();
    out.define_simple_column("a", None, ScalarType::F64).unwrap();
    out.define_simple_column("b", None, ScalarType::F64).unwrap();
    for k in 0..2 {
        out.start_page(4).unwrap();
        out.set_parameter("t", k as f64).unwrap();
        let a: Vec<f64> = (0..4).map(|i| (k * 100 + i) as f64).collect();
        let b: Vec<f64> = (0..4).map(|i| (k * 100 + i) as f64 / 2.0).collect();
        out.set_column("a", &a).unwrap();
        out.set_column("b", &b).unwrap();
        out.write_page().unwrap();
    }
    out.terminate().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let len = bytes.len() - cut_back;
    bytes.truncate(len);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn truncation_returns_soft_zero_then_terminates() {
    let dir = tempfile::tempdir().unwrap();
    // cut into the middle of the last row's second cell
    let path = truncated_file(dir.path(), 4);

    let mut input = SdfReader::open(&path).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Truncated);
    assert!(input.recovery_possible());
    assert_eq!(input.read_page().unwrap(), ReadOutcome::EndOfStream);
    assert!(input
        .diagnostics()
        .iter()
        .any(|d| d.tag == "DATA_TRUNCATED"));
}

#[test]
fn recovery_opt_in_yields_partial_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = truncated_file(dir.path(), 4);

    let mut input = SdfReader::open(&path).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Truncated);
    let page = input.accept_recovered_page().unwrap();
    assert_eq!(page, 2);
    // the last row was cut mid-cell; the three complete rows survive
    assert_eq!(input.n_rows(), 3);
    assert_eq!(input.column_as_f64("a").unwrap(), vec![100.0, 101.0, 102.0]);
    assert_eq!(input.column_as_f64("b").unwrap(), vec![50.0, 50.5, 51.0]);
    assert_eq!(input.parameter_as_f64("t").unwrap(), 1.0);
    // recovery is one-shot
    assert!(input.accept_recovered_page().is_err());
}

#[test]
fn auto_recover_hands_partial_page_out_directly() {
    let dir = tempfile::tempdir().unwrap();
    let path = truncated_file(dir.path(), 4);

    let config = SdfConfig {
        auto_recover: true,
        ..SdfConfig::DEFAULT
    };
    let mut input = SdfReader::open_with(&path, config).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(2));
    assert_eq!(input.n_rows(), 3);
    assert_eq!(input.read_page().unwrap(), ReadOutcome::EndOfStream);
}

#[test]
fn header_truncation_is_a_syntax_error_not_recoverable() {
    let dir = tempfile::tempdir().unwrap();
    let path = truncated_file(dir.path(), 0);
    let full = std::fs::read(&path).unwrap();

    // cut inside the header, before the &data clause
    let header_end = full
        .windows(5)
        .position(|w| w == b"&data")
        .expect("header contains a &data clause");
    let cut_path = dir.path().join("header_cut.sdf");
    std::fs::write(&cut_path, &full[..header_end.saturating_sub(10)]).unwrap();

    let err = SdfReader::open(&cut_path).err().expect("open should fail");
    assert!(
        matches!(err, SdfError::HeaderSyntax { .. }),
        "expected HEADER_SYNTAX, got {err:?}"
    );
}

#[test]
fn ascii_truncation_recovers_full_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.sdf");
    let mut out = SdfWriter::create(&path, DataMode::ascii(), None, None).unwrap();
    out.define_simple_column("a", None, ScalarType::F64).unwrap();
    out.define_simple_column("tag", None, ScalarType::String).unwrap();
    out.start_page(3).unwrap();
    out.set_column("a", &[1.0, 2.0, 3.0]).unwrap();
    out.set_column("tag", &["one", "two", "three"]).unwrap();
    out.write_page().unwrap();
    out.terminate().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let cut = text.rfind("three").unwrap();
    std::fs::write(&path, &text[..cut]).unwrap();

    let mut input = SdfReader::open(&path).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Truncated);
    input.accept_recovered_page().unwrap();
    assert_eq!(input.n_rows(), 2);
    assert_eq!(input.column_as_strings("tag").unwrap(), vec!["one", "two"]);
}

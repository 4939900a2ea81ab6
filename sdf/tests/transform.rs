//! Definition transfer and the columns-to-parameters expansion

use sdf::{
    CheckResult, ColumnDef, DataMode, ReadOutcome, ScalarType, SdfError, SdfReader, SdfWriter,
    TypeClass, Value,
};
use std::path::Path;

fn write_ab_page(path: &Path) {
    let mut out = SdfWriter::create(path, DataMode::binary(), None, None).unwrap();
    let mut a = ColumnDef::new("a", ScalarType::F64).with_units("m");
    a.description = Some("horizontal position".to_string());
    a.format_string = Some("%12.5f".to_string());
    out.define_column(a).unwrap();
    out.define_simple_column("b", Some("rad"), ScalarType::F64).unwrap();
    out.start_page(3).unwrap();
    out.set_column("a", &[1.0, 2.0, 3.0]).unwrap();
    out.set_column("b", &[0.1, 0.2, 0.3]).unwrap();
    out.write_page().unwrap();
    out.terminate().unwrap();
}

#[test]
fn expand_columns_to_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.sdf");
    let output_path = dir.path().join("out.sdf");
    write_ab_page(&input_path);

    let mut input = SdfReader::open(&input_path).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));

    let mut output =
        SdfWriter::create(&output_path, DataMode::binary(), None, None).unwrap();
    output.define_parameter_like_column(&input, "a", None).unwrap();
    output.define_parameter_like_column(&input, "b", None).unwrap();
    assert_eq!(
        output.layout().parameter("a").unwrap().units.as_deref(),
        Some("m")
    );

    // one output page per input row, parameters carrying the row's cells
    let rows = input.n_rows();
    for r in 0..rows {
        let a = input.internal_column("a").unwrap().get(r).unwrap();
        let b = input.internal_column("b").unwrap().get(r).unwrap();
        output.start_page(0).unwrap();
        output.set_parameter("a", a).unwrap();
        output.set_parameter("b", b).unwrap();
        output.write_page().unwrap();
    }
    output.terminate().unwrap();
    input.terminate().unwrap();

    let mut reread = SdfReader::open(&output_path).unwrap();
    let mut seen = Vec::new();
    while let ReadOutcome::Page(_) = reread.read_page().unwrap() {
        seen.push((
            reread.parameter_as_f64("a").unwrap(),
            reread.parameter_as_f64("b").unwrap(),
        ));
    }
    assert_eq!(seen, vec![(1.0, 0.1), (2.0, 0.2), (3.0, 0.3)]);
}

#[test]
fn define_like_column_keeps_existing_parameter() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.sdf");
    write_ab_page(&input_path);
    let input = SdfReader::open(&input_path).unwrap();

    let output_path = dir.path().join("out.sdf");
    let mut output =
        SdfWriter::create(&output_path, DataMode::binary(), None, None).unwrap();
    output.define_simple_parameter("a", Some("furlong"), ScalarType::F64).unwrap();

    // the pre-existing definition wins and a warning is queued
    output.define_parameter_like_column(&input, "a", None).unwrap();
    assert_eq!(
        output.layout().parameter("a").unwrap().units.as_deref(),
        Some("furlong")
    );
    assert_eq!(output.n_errors(), 1);
    output.abandon();
}

#[test]
fn transfer_definition_preserves_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.sdf");
    write_ab_page(&input_path);
    let input = SdfReader::open(&input_path).unwrap();

    let output_path = dir.path().join("out.sdf");
    let mut output =
        SdfWriter::create(&output_path, DataMode::binary(), None, None).unwrap();
    output
        .transfer_column_definition(&input, "a", Some("aFiltered"))
        .unwrap();

    let src = input.layout().column("a").unwrap();
    let copied = output.layout().column("aFiltered").unwrap();
    assert_eq!(copied.data_type, src.data_type);
    assert_eq!(copied.units, src.units);
    assert_eq!(copied.description, src.description);
    assert_eq!(copied.format_string, src.format_string);
    output.abandon();
}

#[test]
fn transfer_conflicting_type_fails() {
    let dir = tempfile::tempdir().unwrap();

    let long_path = dir.path().join("long.sdf");
    let mut out = SdfWriter::create(&long_path, DataMode::binary(), None, None).unwrap();
    out.define_simple_column("aFiltered", None, ScalarType::I32).unwrap();
    out.start_page(0).unwrap();
    out.write_page().unwrap();
    out.terminate().unwrap();
    let conflicting = SdfReader::open(&long_path).unwrap();

    let ab_path = dir.path().join("in.sdf");
    write_ab_page(&ab_path);
    let input = SdfReader::open(&ab_path).unwrap();

    let output_path = dir.path().join("out.sdf");
    let mut output =
        SdfWriter::create(&output_path, DataMode::binary(), None, None).unwrap();
    output
        .transfer_column_definition(&input, "a", Some("aFiltered"))
        .unwrap();

    // same target, different type
    let err = output
        .transfer_column_definition(&conflicting, "aFiltered", None)
        .unwrap_err();
    assert!(matches!(err, SdfError::DefinitionConflict { .. }));

    // matching type is a silent no-op
    output
        .transfer_column_definition(&input, "a", Some("aFiltered"))
        .unwrap();
    output.abandon();
}

#[test]
fn transfer_all_definitions_then_copy_pages() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.sdf");
    let output_path = dir.path().join("out.sdf");

    let mut out = SdfWriter::create(&input_path, DataMode::ascii(), None, None).unwrap();
    out.define_simple_parameter("t", Some("s"), ScalarType::F64).unwrap();
    out.define_simple_column("x", None, ScalarType::F64).unwrap();
    out.define_array(sdf::ArrayDef::new("w", ScalarType::I32, 1)).unwrap();
    out.start_page(2).unwrap();
    out.set_parameter("t", 7.5).unwrap();
    out.set_column("x", &[4.0, 5.0]).unwrap();
    out.set_array("w", &[3], &[7, 8, 9]).unwrap();
    out.write_page().unwrap();
    out.terminate().unwrap();

    let mut input = SdfReader::open(&input_path).unwrap();
    let mut output = SdfWriter::create(&output_path, DataMode::binary(), None, None).unwrap();
    output.transfer_all_parameter_definitions(&input).unwrap();
    output.transfer_all_column_definitions(&input).unwrap();
    output.transfer_all_array_definitions(&input).unwrap();

    while let ReadOutcome::Page(_) = input.read_page().unwrap() {
        output.copy_page(&input).unwrap();
        output.write_page().unwrap();
    }
    output.terminate().unwrap();

    let mut reread = SdfReader::open(&output_path).unwrap();
    assert_eq!(reread.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(reread.parameter_as_f64("t").unwrap(), 7.5);
    assert_eq!(reread.column_as_f64("x").unwrap(), vec![4.0, 5.0]);
    let (dims, w) = reread.array_as_f64("w").unwrap();
    assert_eq!(dims, vec![3]);
    assert_eq!(w, vec![7.0, 8.0, 9.0]);
}

#[test]
fn existence_checks_grade_entities() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.sdf");
    write_ab_page(&input_path);
    let input = SdfReader::open(&input_path).unwrap();

    assert_eq!(
        input.check_column("a", Some("m"), TypeClass::Float),
        CheckResult::Okay
    );
    assert_eq!(
        input.check_column("a", Some("mm"), TypeClass::Float),
        CheckResult::WrongUnits
    );
    assert_eq!(
        input.check_column("a", None, TypeClass::Integer),
        CheckResult::WrongType
    );
    assert_eq!(
        input.check_column("missing", None, TypeClass::Any),
        CheckResult::NonExistent
    );
}

#[test]
fn window_filter_then_write_keeps_selected_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.sdf");
    let output_path = dir.path().join("out.sdf");
    write_ab_page(&input_path);

    let mut input = SdfReader::open(&input_path).unwrap();
    input.read_page().unwrap();
    let kept = input.filter_rows_by_window("a", 1.5, 3.5, false).unwrap();
    assert_eq!(kept, 2);
    assert_eq!(input.count_rows_of_interest(), 2);
    assert_eq!(input.column_as_f64("a").unwrap(), vec![2.0, 3.0]);

    let sink = sdf::ByteSink::create(&output_path).unwrap();
    let mut output = SdfWriter::initialize_copy(&input, sink).unwrap();
    output.copy_page(&input).unwrap();
    output.write_page().unwrap();
    output.terminate().unwrap();

    let mut reread = SdfReader::open(&output_path).unwrap();
    reread.read_page().unwrap();
    assert_eq!(reread.n_rows(), 2);
    assert_eq!(reread.column_as_f64("b").unwrap(), vec![0.2, 0.3]);
}

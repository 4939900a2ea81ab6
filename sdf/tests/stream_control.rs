//! Page filters, row limits, in-place rewrite, and page seeking

use sdf::{
    DataMode, PageFilter, ReadOutcome, ScalarType, SdfConfig, SdfReader, SdfWriter, Value,
};
use std::path::Path;

/// Five pages; page k has parameter p=k and column v = [k*10, k*10+1, k*10+2]
fn write_five_pages(path: &Path, mode: DataMode) {
    let mut out = SdfWriter::create(path, mode, None, None).unwrap();
    out.define_simple_parameter("p", None, ScalarType::I32).unwrap();
    out.define_simple_column("v", None, ScalarType::I32).unwrap();
    for k in 1..=5i32 {
        out.start_page(3).unwrap();
        out.set_parameter("p", k).unwrap();
        out.set_column("v", &[k * 10, k * 10 + 1, k * 10 + 2]).unwrap();
        out.write_page().unwrap();
    }
    out.terminate().unwrap();
}

#[test]
fn pages_arrive_in_order_without_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::binary());

    let mut input = SdfReader::open(&path).unwrap();
    let mut seen = Vec::new();
    while let ReadOutcome::Page(n) = input.read_page().unwrap() {
        seen.push(n);
        assert_eq!(input.parameter_as_i64("p").unwrap(), n as i64);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[test]
fn page_filters_select_physical_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::ascii());

    let mut input = SdfReader::open(&path).unwrap();
    input.set_page_filter(PageFilter {
        from_page: Some(2),
        to_page: Some(4),
        keep_pages: None,
        remove_pages: vec![3],
    });
    let mut seen = Vec::new();
    while let ReadOutcome::Page(n) = input.read_page().unwrap() {
        seen.push(n);
    }
    assert_eq!(seen, vec![2, 4]);

    let mut input = SdfReader::open(&path).unwrap();
    input.set_page_filter(PageFilter {
        keep_pages: Some(vec![1, 5]),
        ..PageFilter::default()
    });
    let mut seen = Vec::new();
    while let ReadOutcome::Page(n) = input.read_page().unwrap() {
        seen.push(n);
    }
    assert_eq!(seen, vec![1, 5]);
}

#[test]
fn in_place_rewrite_with_page_removal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::binary());

    // rewrite in place, dropping pages 2 and 4
    let mut input = SdfReader::open(&path).unwrap();
    input.set_page_filter(PageFilter {
        remove_pages: vec![2, 4],
        ..PageFilter::default()
    });
    let sink = sdf::ByteSink::create_in_place(&path).unwrap();
    let mut output = SdfWriter::initialize_copy(&input, sink).unwrap();
    while let ReadOutcome::Page(_) = input.read_page().unwrap() {
        output.copy_page(&input).unwrap();
        output.write_page().unwrap();
    }
    output.terminate().unwrap();
    input.terminate().unwrap();

    // the result is pages numbered 1..3 carrying payloads 1, 3, 5
    let mut reread = SdfReader::open(&path).unwrap();
    let mut payloads = Vec::new();
    let mut numbers = Vec::new();
    while let ReadOutcome::Page(n) = reread.read_page().unwrap() {
        numbers.push(n);
        payloads.push(reread.parameter_as_i64("p").unwrap());
        let v = reread.column_as_i32("v").unwrap();
        let k = payloads.last().copied().unwrap() as i32;
        assert_eq!(v, vec![k * 10, k * 10 + 1, k * 10 + 2]);
    }
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(payloads, vec![1, 3, 5]);

    // the original survives as the backup
    let backup = dir.path().join("five.sdf~");
    let mut old = SdfReader::open(&backup).unwrap();
    let mut count = 0;
    while let ReadOutcome::Page(_) = old.read_page().unwrap() {
        count += 1;
    }
    assert_eq!(count, 5);
}

#[test]
fn row_limit_clips_pages_and_queues_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.sdf");

    let mut out = SdfWriter::create(&path, DataMode::binary(), None, None).unwrap();
    out.define_simple_column("v", None, ScalarType::I32).unwrap();
    let rows: Vec<i32> = (0..250).collect();
    out.start_page(250).unwrap();
    out.set_column("v", &rows).unwrap();
    out.write_page().unwrap();
    out.terminate().unwrap();

    let config = SdfConfig {
        row_limit: Some(100),
        ..SdfConfig::DEFAULT
    };
    let mut input = SdfReader::open_with(&path, config).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.n_rows(), 100);
    assert_eq!(input.column_as_i32("v").unwrap()[99], 99);
    assert!(input
        .diagnostics()
        .iter()
        .any(|d| d.tag == "ROW_LIMIT_HIT"));
}

#[test]
fn sparse_reading_keeps_every_kth_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::binary());

    let mut input = SdfReader::open(&path).unwrap();
    assert!(matches!(
        input.read_page_sparse(2, 1).unwrap(),
        ReadOutcome::Page(1)
    ));
    // 3-row page, offset 1, interval 2: only row index 1 survives
    assert_eq!(input.column_as_i32("v").unwrap(), vec![11]);

    let mut input = SdfReader::open(&path).unwrap();
    assert!(matches!(
        input.read_page_sparse(2, 0).unwrap(),
        ReadOutcome::Page(1)
    ));
    assert_eq!(input.column_as_i32("v").unwrap(), vec![10, 12]);
}

#[test]
fn goto_page_revisits_and_skips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::binary());

    let mut input = SdfReader::open(&path).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(2));

    // back to a page already read
    input.goto_page(1).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.parameter_as_i64("p").unwrap(), 1);

    // forward past pages not yet read
    input.goto_page(5).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(5));
    assert_eq!(input.parameter_as_i64("p").unwrap(), 5);

    // beyond the end is an error
    assert!(input.goto_page(9).is_err());
}

#[cfg(feature = "mmap")]
#[test]
fn mapped_input_reads_and_seeks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::binary());

    let mut input = SdfReader::open_mapped(&path).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(1));
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(2));
    input.goto_page(2).unwrap();
    assert_eq!(input.read_page().unwrap(), ReadOutcome::Page(2));
    assert_eq!(input.parameter("p").unwrap(), Value::I32(2));
}

#[test]
fn boxed_pipe_source_streams_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.sdf");
    write_five_pages(&path, DataMode::ascii());
    let bytes = std::fs::read(&path).unwrap();

    let source = sdf::ByteSource::from_reader(Box::new(std::io::Cursor::new(bytes)));
    let mut input = SdfReader::from_source(source, SdfConfig::DEFAULT).unwrap();
    let mut count = 0;
    while let ReadOutcome::Page(_) = input.read_page().unwrap() {
        count += 1;
    }
    assert_eq!(count, 5);
    // pipes cannot seek
    assert!(input.goto_page(1).is_err());
}

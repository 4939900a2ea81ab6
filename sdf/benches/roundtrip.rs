//! Page encode/decode throughput for both wire modes.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use sdf::{DataMode, ReadOutcome, ScalarType, SdfConfig, SdfReader, SdfWriter};

const ROWS: usize = 10_000;

fn build_stream(mode: DataMode) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.sdf");
    let mut out = SdfWriter::create(&path, mode, None, None).unwrap();
    out.define_simple_parameter("t", None, ScalarType::F64).unwrap();
    out.define_simple_column("x", None, ScalarType::F64).unwrap();
    out.define_simple_column("y", None, ScalarType::F64).unwrap();
    let x: Vec<f64> = (0..ROWS).map(|i| i as f64 * 0.001).collect();
    let y: Vec<f64> = (0..ROWS).map(|i| (i as f64).sin()).collect();
    for page in 0..4 {
        out.start_page(ROWS).unwrap();
        out.set_parameter("t", page as f64).unwrap();
        out.set_column("x", &x).unwrap();
        out.set_column("y", &y).unwrap();
        out.write_page().unwrap();
    }
    out.terminate().unwrap();
    std::fs::read(&path).unwrap()
}

fn read_all(bytes: &[u8]) -> usize {
    let source = sdf::ByteSource::from_reader(Box::new(std::io::Cursor::new(bytes.to_vec())));
    let mut input = SdfReader::from_source(source, SdfConfig::DEFAULT).unwrap();
    let mut rows = 0;
    while let ReadOutcome::Page(_) = input.read_page().unwrap() {
        rows += input.n_rows();
    }
    rows
}

fn bench_roundtrip(c: &mut Criterion) {
    let binary = build_stream(DataMode::binary());
    let ascii = build_stream(DataMode::ascii());

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(binary.len() as u64));
    group.bench_function("binary", |b| {
        b.iter(|| assert_eq!(read_all(&binary), 4 * ROWS))
    });
    group.throughput(Throughput::Bytes(ascii.len() as u64));
    group.bench_function("ascii", |b| {
        b.iter(|| assert_eq!(read_all(&ascii), 4 * ROWS))
    });
    group.finish();

    c.bench_function("write/binary", |b| {
        b.iter(|| build_stream(DataMode::binary()).len())
    });
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);

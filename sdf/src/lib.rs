//! SDF - Self-Describing Data Format Streams
//!
//! This library provides the stream engine the command-line utilities are
//! built on: open an input, iterate its pages, get and set columns,
//! parameters, and arrays by name, define entities for an output, copy a
//! layout from an input, write pages, terminate.
//!
//! ## Architecture
//!
//! SDF follows a format/endpoint separation:
//!
//! - **sdf-core**: scalar types, the layout model, the header codec, the
//!   page buffer, and the binary/textual page codecs (no endpoints)
//! - **sdf**: byte sources and sinks, the stream controller, per-stream
//!   diagnostics, and the CLI helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdf::{ReadOutcome, SdfReader};
//!
//! fn example() -> sdf::Result<()> {
//!     let mut input = SdfReader::open("history.sdf")?;
//!     while let ReadOutcome::Page(n) = input.read_page()? {
//!         let t = input.parameter_as_f64("t")?;
//!         let x = input.column_as_f64("x")?;
//!         println!("page {n}: t={t}, {} rows", x.len());
//!     }
//!     input.terminate()
//! }
//! ```

// Re-export the format layer
pub use sdf_core::{
    default_config, set_default_auto_recover, set_default_name_validity, set_default_row_limit,
    ArrayData, ArrayDef, AssociateDef, ColumnData, ColumnDef, DataMode, EntityKind, FileMode,
    Layout, NameValidity, PageBuffer, ParameterDef, Result, ScalarType, SdfConfig, SdfError,
    Value,
};

// Implementation modules
pub mod diagnostics;
pub mod pipes;
pub mod reader;
pub mod source;
pub mod writer;

// Public exports
pub use diagnostics::{register_program_name, set_diagnostic_sink, Diagnostic, DiagnosticSink, ErrorQueue, Severity};
pub use pipes::{parse_pipe_option, process_filenames, FilenamePair, PipeFlags};
pub use reader::{CheckResult, PageFilter, ReadOutcome, SdfReader, TypeClass};
pub use source::{ByteSink, ByteSource};
pub use writer::SdfWriter;

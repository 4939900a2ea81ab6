//! Header codec: textual header vocabulary ↔ [`Layout`]
//!
//! The header is the magic line `SDDS<version-digit>` followed by `&kind
//! ... &end` clauses. Recognized kinds are `description`, `parameter`,
//! `column`, `array`, `associate`, and `data`; anything else is a syntax
//! error. Parsing stops after the `&data` clause so the caller can read the
//! data pages from the same reader; a header with no `&data` clause gets
//! the textual row-major default.

pub mod emit;
pub mod scan;

pub use emit::write_layout;

use crate::config::NameValidity;
use crate::error::{Result, SdfError};
use crate::layout::{
    ArrayDef, AssociateDef, ColumnDef, DataMode, FileMode, Layout, ParameterDef,
};
use crate::types::ScalarType;
use scan::{Clause, ClauseScanner};
use std::io::BufRead;

/// Magic prefix of the version line
pub const MAGIC: &str = "SDDS";

fn syntax(line: u64, message: impl Into<String>) -> SdfError {
    SdfError::HeaderSyntax {
        line,
        message: message.into(),
    }
}

/// Read the header from a byte source and build the layout
///
/// On return the reader is positioned at the first byte of page data. The
/// caller decides the validity rules the resulting layout will enforce for
/// later definitions; names already in the header are accepted as-is, the
/// way relaxed mode would.
pub fn read_layout<R: BufRead>(reader: &mut R, validity: NameValidity) -> Result<Layout> {
    let mut first = String::new();
    if reader.read_line(&mut first)? == 0 {
        return Err(SdfError::EndOfStream);
    }
    let first = first.trim_end_matches(['\r', '\n']);
    let version = first
        .strip_prefix(MAGIC)
        .and_then(|rest| rest.parse::<u8>().ok())
        .filter(|v| (1..=Layout::MAX_READ_VERSION).contains(v))
        .ok_or_else(|| syntax(1, format!("not an SDF file: first line {first:?}")))?;

    // header names were validated by their producer; accept them as-is
    let mut layout = Layout::with_validity(NameValidity::Any);
    layout.version = version;

    let mut scanner = ClauseScanner::new(reader, 1);
    while let Some(mut clause) = scanner.next_clause()? {
        match clause.kind.as_str() {
            "description" => {
                layout.description = clause.take("text");
                layout.contents = clause.take("contents");
                clause.expect_empty()?;
            }
            "parameter" => {
                let def = parse_parameter(&mut clause)?;
                layout.define_parameter(def)?;
            }
            "column" => {
                let def = parse_column(&mut clause)?;
                layout.define_column(def)?;
            }
            "array" => {
                let def = parse_array(&mut clause)?;
                layout.define_array(def)?;
            }
            "associate" => {
                let def = parse_associate(&mut clause)?;
                layout.define_associate(def)?;
            }
            "data" => {
                layout.data_mode = parse_data(&mut clause)?;
                break;
            }
            other => {
                return Err(syntax(clause.line, format!("unknown clause kind &{other}")));
            }
        }
    }

    // definitions made after open obey the configured rules
    layout.set_name_validity(validity);
    if layout.data_mode.lines_per_row == 0 {
        layout.data_mode.lines_per_row = 1;
    }
    Ok(layout)
}

fn required(clause: &mut Clause, key: &str) -> Result<String> {
    clause.take(key).ok_or_else(|| {
        syntax(
            clause.line,
            format!("&{} clause is missing required key {key:?}", clause.kind),
        )
    })
}

fn scalar_type(clause: &mut Clause) -> Result<ScalarType> {
    let token = required(clause, "type")?;
    ScalarType::from_name(&token)
        .ok_or_else(|| syntax(clause.line, format!("unknown type token {token:?}")))
}

fn take_usize(clause: &mut Clause, key: &str) -> Result<Option<usize>> {
    match clause.take(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| syntax(clause.line, format!("{key} must be an unsigned integer"))),
    }
}

fn take_flag(clause: &mut Clause, key: &str) -> Result<bool> {
    match clause.take(key).as_deref() {
        None | Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(v) => Err(syntax(clause.line, format!("{key} must be 0 or 1, got {v:?}"))),
    }
}

fn parse_parameter(clause: &mut Clause) -> Result<ParameterDef> {
    let def = ParameterDef {
        name: required(clause, "name")?,
        data_type: scalar_type(clause)?,
        symbol: clause.take("symbol"),
        units: clause.take("units"),
        description: clause.take("description"),
        format_string: clause.take("format_string"),
        fixed_value: clause.take("fixed_value"),
    };
    clause.expect_empty()?;
    Ok(def)
}

fn parse_column(clause: &mut Clause) -> Result<ColumnDef> {
    let def = ColumnDef {
        name: required(clause, "name")?,
        data_type: scalar_type(clause)?,
        symbol: clause.take("symbol"),
        units: clause.take("units"),
        description: clause.take("description"),
        format_string: clause.take("format_string"),
        field_length: take_usize(clause, "field_length")?,
    };
    clause.expect_empty()?;
    Ok(def)
}

fn parse_array(clause: &mut Clause) -> Result<ArrayDef> {
    let def = ArrayDef {
        name: required(clause, "name")?,
        data_type: scalar_type(clause)?,
        symbol: clause.take("symbol"),
        units: clause.take("units"),
        description: clause.take("description"),
        format_string: clause.take("format_string"),
        group_name: clause.take("group_name"),
        field_length: take_usize(clause, "field_length")?,
        dimensions: take_usize(clause, "dimensions")?.unwrap_or(1),
    };
    clause.expect_empty()?;
    Ok(def)
}

fn parse_associate(clause: &mut Clause) -> Result<AssociateDef> {
    let filename = required(clause, "filename")?;
    let def = AssociateDef {
        name: clause.take("name").unwrap_or_else(|| filename.clone()),
        filename,
        path: clause.take("path"),
        description: clause.take("description"),
        contents: clause.take("contents"),
        sdds: take_flag(clause, "sdds")?,
    };
    clause.expect_empty()?;
    Ok(def)
}

fn parse_data(clause: &mut Clause) -> Result<DataMode> {
    let token = required(clause, "mode")?;
    let mode = FileMode::from_name(&token)
        .ok_or_else(|| syntax(clause.line, format!("unknown data mode {token:?}")))?;
    let data_mode = DataMode {
        mode,
        lines_per_row: take_usize(clause, "lines_per_row")?.unwrap_or(1).max(1),
        no_row_counts: take_flag(clause, "no_row_counts")?,
        additional_header_lines: take_usize(clause, "additional_header_lines")?.unwrap_or(0),
        column_major: take_flag(clause, "column_major_order")?,
    };
    clause.expect_empty()?;
    Ok(data_mode)
}

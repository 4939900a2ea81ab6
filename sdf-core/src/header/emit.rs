//! Header emission: [`Layout`] → textual header vocabulary
//!
//! Emitting and re-reading a layout yields an equal layout. Keys carrying
//! their default value are left off the wire; the parser supplies the same
//! defaults on the way back in.

use crate::error::Result;
use crate::layout::Layout;
use std::io::Write;

/// Quote header values that free-format scanning would mangle
fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '"' | '!' | '&' | '='))
}

fn write_value<W: Write>(w: &mut W, value: &str) -> Result<()> {
    if !needs_quoting(value) {
        w.write_all(value.as_bytes())?;
        return Ok(());
    }
    w.write_all(b"\"")?;
    for c in value.chars() {
        match c {
            '"' => w.write_all(b"\\\"")?,
            '\\' => w.write_all(b"\\\\")?,
            _ => {
                let mut buf = [0u8; 4];
                w.write_all(c.encode_utf8(&mut buf).as_bytes())?;
            }
        }
    }
    w.write_all(b"\"")?;
    Ok(())
}

fn write_pair<W: Write>(w: &mut W, key: &str, value: &str) -> Result<()> {
    write!(w, "{key}=")?;
    write_value(w, value)?;
    w.write_all(b", ")?;
    Ok(())
}

fn write_opt<W: Write>(w: &mut W, key: &str, value: &Option<String>) -> Result<()> {
    if let Some(v) = value {
        write_pair(w, key, v)?;
    }
    Ok(())
}

/// Emit the full header, magic line through `&data` clause
pub fn write_layout<W: Write>(w: &mut W, layout: &Layout) -> Result<()> {
    writeln!(w, "{}{}", super::MAGIC, layout.version)?;

    if layout.description.is_some() || layout.contents.is_some() {
        w.write_all(b"&description ")?;
        write_opt(w, "text", &layout.description)?;
        write_opt(w, "contents", &layout.contents)?;
        w.write_all(b"&end\n")?;
    }

    for def in layout.parameters() {
        w.write_all(b"&parameter ")?;
        write_pair(w, "name", &def.name)?;
        write_pair(w, "type", def.data_type.name())?;
        write_opt(w, "symbol", &def.symbol)?;
        write_opt(w, "units", &def.units)?;
        write_opt(w, "description", &def.description)?;
        write_opt(w, "format_string", &def.format_string)?;
        write_opt(w, "fixed_value", &def.fixed_value)?;
        w.write_all(b"&end\n")?;
    }

    for def in layout.columns() {
        w.write_all(b"&column ")?;
        write_pair(w, "name", &def.name)?;
        write_pair(w, "type", def.data_type.name())?;
        write_opt(w, "symbol", &def.symbol)?;
        write_opt(w, "units", &def.units)?;
        write_opt(w, "description", &def.description)?;
        write_opt(w, "format_string", &def.format_string)?;
        if let Some(n) = def.field_length {
            write_pair(w, "field_length", &n.to_string())?;
        }
        w.write_all(b"&end\n")?;
    }

    for def in layout.arrays() {
        w.write_all(b"&array ")?;
        write_pair(w, "name", &def.name)?;
        write_pair(w, "type", def.data_type.name())?;
        write_pair(w, "dimensions", &def.dimensions.to_string())?;
        write_opt(w, "symbol", &def.symbol)?;
        write_opt(w, "units", &def.units)?;
        write_opt(w, "description", &def.description)?;
        write_opt(w, "format_string", &def.format_string)?;
        write_opt(w, "group_name", &def.group_name)?;
        if let Some(n) = def.field_length {
            write_pair(w, "field_length", &n.to_string())?;
        }
        w.write_all(b"&end\n")?;
    }

    for def in layout.associates() {
        w.write_all(b"&associate ")?;
        write_pair(w, "filename", &def.filename)?;
        if def.name != def.filename {
            write_pair(w, "name", &def.name)?;
        }
        write_opt(w, "path", &def.path)?;
        write_opt(w, "contents", &def.contents)?;
        write_opt(w, "description", &def.description)?;
        if def.sdds {
            write_pair(w, "sdds", "1")?;
        }
        w.write_all(b"&end\n")?;
    }

    let mode = &layout.data_mode;
    w.write_all(b"&data ")?;
    write_pair(w, "mode", mode.mode.name())?;
    if mode.lines_per_row != 1 {
        write_pair(w, "lines_per_row", &mode.lines_per_row.to_string())?;
    }
    if mode.no_row_counts {
        write_pair(w, "no_row_counts", "1")?;
    }
    if mode.additional_header_lines != 0 {
        write_pair(
            w,
            "additional_header_lines",
            &mode.additional_header_lines.to_string(),
        )?;
    }
    if mode.column_major {
        write_pair(w, "column_major_order", "1")?;
    }
    w.write_all(b"&end\n")?;
    Ok(())
}

//! Textual page codec
//!
//! Each parameter occupies one line; each array occupies a dimension line
//! followed by its whitespace-separated elements; the column table follows,
//! one row per `lines_per_row` physical lines (row-major) or one
//! free-wrapped block per column (column-major). Pages are separated by a
//! blank line, which in `no_row_counts` mode is also the only end-of-page
//! signal.

use super::text::{push_value, TokenScanner};
use super::{PageOutcome, PageStatus, ReadOptions, WriteOptions};
use crate::error::{Result, SdfError};
use crate::layout::Layout;
use crate::page::{ArrayData, ColumnData, PageBuffer};
use crate::types::{ScalarType, Value};
use std::io::{BufRead, Write};

/// Elements per physical line when wrapping array and column blocks
const WRAP: usize = 10;

/// Encode the current page
pub fn write_page<W: Write>(
    w: &mut W,
    layout: &Layout,
    page: &PageBuffer,
    opts: &WriteOptions,
) -> Result<()> {
    let mode = &layout.data_mode;
    if mode.no_row_counts && mode.column_major {
        return Err(SdfError::usage(
            "column-major order cannot be combined with no_row_counts",
        ));
    }
    if opts.first_page {
        for _ in 0..mode.additional_header_lines {
            w.write_all(b"\n")?;
        }
    }

    for (i, def) in layout.parameters().iter().enumerate() {
        if def.fixed_value.is_some() {
            continue;
        }
        let value = match page.parameter_value(i) {
            Some(v) => v.clone(),
            None => Value::default_for(def.data_type),
        };
        let mut line = String::new();
        push_value(&mut line, &value, def.format_string.as_deref());
        writeln!(w, "{line}")?;
    }

    for (i, def) in layout.arrays().iter().enumerate() {
        let empty = ArrayData {
            dims: vec![0; def.dimensions],
            data: ColumnData::with_capacity(def.data_type, 0),
        };
        let block = page.array_value(i).unwrap_or(&empty);
        let mut dims_line = String::new();
        for d in 0..def.dimensions {
            if d > 0 {
                dims_line.push(' ');
            }
            dims_line.push_str(&block.dims.get(d).copied().unwrap_or(0).to_string());
        }
        writeln!(w, "{dims_line}")?;
        write_wrapped(w, &block.data, None, def.format_string.as_deref())?;
    }

    let kept_rows: Vec<usize> = (0..page.n_rows())
        .filter(|&r| page.row_flag(r).unwrap_or(true))
        .collect();
    let kept_cols: Vec<usize> = (0..page.n_columns())
        .filter(|&c| opts.restore_suppressed_columns || page.column_flag(c).unwrap_or(true))
        .collect();

    if page.n_columns() > 0 {
        if !mode.no_row_counts {
            writeln!(w, "{}", kept_rows.len())?;
        }
        if mode.column_major {
            for &c in &kept_cols {
                let suppressed =
                    opts.restore_suppressed_columns && !page.column_flag(c).unwrap_or(true);
                let data = page.column(c).unwrap();
                let format = layout.column_at(c).and_then(|d| d.format_string.clone());
                if suppressed {
                    let defaults = default_block(data.scalar_type(), kept_rows.len());
                    write_wrapped(w, &defaults, None, format.as_deref())?;
                } else {
                    write_wrapped(w, data, Some(&kept_rows), format.as_deref())?;
                }
            }
        } else {
            let per_line = kept_cols.len().div_ceil(mode.lines_per_row.max(1));
            for &r in &kept_rows {
                let mut cells = Vec::with_capacity(kept_cols.len());
                for &c in &kept_cols {
                    let def = layout.column_at(c).unwrap();
                    let suppressed =
                        opts.restore_suppressed_columns && !page.column_flag(c).unwrap_or(true);
                    let value = if suppressed {
                        Value::default_for(def.data_type)
                    } else {
                        page.column(c)
                            .unwrap()
                            .get(r)
                            .unwrap_or_else(|| Value::default_for(def.data_type))
                    };
                    let mut cell = String::new();
                    push_value(&mut cell, &value, def.format_string.as_deref());
                    if let Some(width) = def.field_length {
                        while cell.len() < width {
                            cell.push(' ');
                        }
                    }
                    cells.push(cell);
                }
                // the reader consumes exactly lines_per_row lines per row
                let mut written = 0;
                for chunk in cells.chunks(per_line.max(1)) {
                    writeln!(w, "{}", chunk.join(" "))?;
                    written += 1;
                }
                while written < mode.lines_per_row.max(1) {
                    w.write_all(b"\n")?;
                    written += 1;
                }
            }
        }
    }
    // page separator; in no_row_counts mode this is the terminator
    w.write_all(b"\n")?;
    Ok(())
}

fn default_block(ty: ScalarType, len: usize) -> ColumnData {
    let mut data = ColumnData::with_capacity(ty, len);
    for _ in 0..len {
        let _ = data.push(Value::default_for(ty));
    }
    data
}

fn write_wrapped<W: Write>(
    w: &mut W,
    data: &ColumnData,
    rows: Option<&[usize]>,
    format: Option<&str>,
) -> Result<()> {
    let count = rows.map(|r| r.len()).unwrap_or_else(|| data.len());
    if count == 0 {
        return Ok(());
    }
    let mut line = String::new();
    let mut on_line = 0usize;
    for i in 0..count {
        let at = rows.map(|r| r[i]).unwrap_or(i);
        let value = data
            .get(at)
            .unwrap_or_else(|| Value::default_for(data.scalar_type()));
        if on_line > 0 {
            line.push(' ');
        }
        push_value(&mut line, &value, format);
        on_line += 1;
        if on_line == WRAP {
            writeln!(w, "{line}")?;
            line.clear();
            on_line = 0;
        }
    }
    if on_line > 0 {
        writeln!(w, "{line}")?;
    }
    Ok(())
}

struct LineSource<'r, R: BufRead> {
    reader: &'r mut R,
    pending: Option<String>,
}

impl<'r, R: BufRead> LineSource<'r, R> {
    fn new(reader: &'r mut R) -> Self {
        LineSource {
            reader,
            pending: None,
        }
    }

    /// Next raw line without its terminator; `None` at end of input
    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn push_back(&mut self, line: String) {
        self.pending = Some(line);
    }

    /// Next line that is not blank; `None` at end of input
    fn next_content_line(&mut self) -> Result<Option<String>> {
        loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(line)),
            }
        }
    }
}

/// Decode the next page into the buffer
pub fn read_page<R: BufRead>(
    r: &mut R,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
    first_page: bool,
) -> Result<PageStatus> {
    let mode = layout.data_mode;
    if mode.no_row_counts && mode.column_major {
        return Err(SdfError::usage(
            "column-major order cannot be combined with no_row_counts",
        ));
    }
    let mut src = LineSource::new(r);
    if first_page {
        for _ in 0..mode.additional_header_lines {
            if src.next_line()?.is_none() {
                return Ok(PageStatus::end_of_stream());
            }
        }
    }

    // a page exists only if some content line does
    match src.next_content_line()? {
        None => return Ok(PageStatus::end_of_stream()),
        Some(line) => src.push_back(line),
    }

    page.start_page(layout, 0);
    let mut status = PageStatus::read();

    for (i, def) in layout.parameters().iter().enumerate() {
        let value = match &def.fixed_value {
            Some(text) => Value::parse(text, def.data_type).map_err(|_| {
                SdfError::usage(format!(
                    "fixed_value {:?} of parameter {:?} does not scan as {}",
                    text, def.name, def.data_type
                ))
            })?,
            None => {
                let line = src
                    .next_line()?
                    .ok_or_else(|| SdfError::truncated("page ended inside parameter data"))?;
                parse_parameter_line(&line, def.data_type)?
            }
        };
        page.set_parameter_value(i, value)?;
    }

    for (i, def) in layout.arrays().iter().enumerate() {
        let dims_line = src
            .next_content_line()?
            .ok_or_else(|| SdfError::truncated("page ended before array dimensions"))?;
        let mut scanner = TokenScanner::new(&dims_line);
        let mut dims = Vec::with_capacity(def.dimensions);
        for _ in 0..def.dimensions {
            let value = scanner
                .next_value(ScalarType::I64)?
                .ok_or_else(|| SdfError::truncated("short array dimension line"))?;
            let size = value.as_i64().filter(|v| *v >= 0).ok_or_else(|| {
                SdfError::truncated("negative array dimension")
            })?;
            dims.push(size as usize);
        }
        let elements: usize = dims.iter().product();
        let data = read_block(&mut src, def.data_type, elements, "array data")?;
        page.set_array_value(i, ArrayData { dims, data })?;
    }

    if layout.n_columns() == 0 {
        // no table section; the next call skips the page separator
        page.set_n_rows(0);
        return Ok(status);
    }

    let limit = opts.row_limit.map(|l| l as usize);
    if mode.no_row_counts {
        read_rows_until_blank(&mut src, layout, page, opts, limit, &mut status)?;
    } else {
        let count_line = src
            .next_content_line()?
            .ok_or_else(|| SdfError::truncated("page ended before row count"))?;
        let total: usize = {
            let mut scanner = TokenScanner::new(&count_line);
            let token = scanner
                .next_token()?
                .ok_or_else(|| SdfError::truncated("blank row count line"))?;
            token
                .parse()
                .map_err(|_| SdfError::truncated(format!("bad row count {token:?}")))?
        };
        if mode.column_major {
            read_columns_counted(&mut src, layout, page, opts, total, limit, &mut status)?;
        } else {
            read_rows_counted(&mut src, layout, page, opts, total, limit, &mut status)?;
        }
    }
    Ok(status)
}

fn parse_parameter_line(line: &str, ty: ScalarType) -> Result<Value> {
    if ty == ScalarType::String {
        let trimmed = line.trim();
        if trimmed.starts_with('"') {
            let mut scanner = TokenScanner::new(trimmed);
            return Ok(scanner
                .next_token()?
                .map(Value::String)
                .unwrap_or_else(|| Value::String(String::new())));
        }
        return Ok(Value::String(trimmed.to_string()));
    }
    let mut scanner = TokenScanner::new(line);
    scanner
        .next_value(ty)?
        .ok_or_else(|| SdfError::truncated("blank line where a parameter value was expected"))
}

/// Collect `count` values of one type, pulling lines as needed
fn read_block<R: BufRead>(
    src: &mut LineSource<'_, R>,
    ty: ScalarType,
    count: usize,
    what: &str,
) -> Result<ColumnData> {
    let mut data = ColumnData::with_capacity(ty, count);
    'outer: while data.len() < count {
        let line = src
            .next_content_line()?
            .ok_or_else(|| SdfError::truncated(format!("page ended inside {what}")))?;
        let mut scanner = TokenScanner::new(&line);
        while data.len() < count {
            match scanner.next_value(ty)? {
                Some(v) => data.push(v)?,
                None => continue 'outer,
            }
        }
    }
    Ok(data)
}

/// Gather one row's `lines_per_row` physical lines and scan its cells
fn scan_row<R: BufRead>(
    src: &mut LineSource<'_, R>,
    layout: &Layout,
    first_line: String,
) -> Result<Vec<Value>> {
    let mut joined = first_line;
    for _ in 1..layout.data_mode.lines_per_row.max(1) {
        let line = src
            .next_line()?
            .ok_or_else(|| SdfError::truncated("page ended mid-row"))?;
        joined.push(' ');
        joined.push_str(&line);
    }
    let mut scanner = TokenScanner::new(&joined);
    let mut row = Vec::with_capacity(layout.n_columns());
    for c in 0..layout.n_columns() {
        let ty = layout.column_type(c).unwrap();
        let value = scanner
            .next_value(ty)?
            .ok_or_else(|| SdfError::truncated("row ended before all columns were scanned"))?;
        row.push(value);
    }
    Ok(row)
}

fn store_row(page: &mut PageBuffer, row: Vec<Value>) -> Result<()> {
    for (c, value) in row.into_iter().enumerate() {
        page.column_mut(c).unwrap().push(value)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn read_rows_counted<R: BufRead>(
    src: &mut LineSource<'_, R>,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
    total: usize,
    limit: Option<usize>,
    status: &mut PageStatus,
) -> Result<()> {
    let mut kept = 0usize;
    for index in 0..total {
        let first = match src.next_content_line()? {
            Some(line) => line,
            None => {
                status.outcome = PageOutcome::Truncated;
                break;
            }
        };
        let row = match scan_row(src, layout, first) {
            Ok(row) => row,
            Err(SdfError::DataTruncated(_)) => {
                status.outcome = PageOutcome::Truncated;
                break;
            }
            Err(e) => return Err(e),
        };
        let over_limit = limit.map(|l| kept >= l).unwrap_or(false);
        if opts.admits(index) && over_limit {
            status.row_limit_hit = true;
        }
        if opts.admits(index) && !over_limit {
            store_row(page, row)?;
            kept += 1;
        }
    }
    page.set_n_rows(kept);
    Ok(())
}

fn read_rows_until_blank<R: BufRead>(
    src: &mut LineSource<'_, R>,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
    limit: Option<usize>,
    status: &mut PageStatus,
) -> Result<()> {
    let mut kept = 0usize;
    let mut index = 0usize;
    loop {
        let first = match src.next_line()? {
            None => break,
            Some(line) if line.trim().is_empty() => break,
            Some(line) => line,
        };
        let row = match scan_row(src, layout, first) {
            Ok(row) => row,
            Err(SdfError::DataTruncated(_)) => {
                status.outcome = PageOutcome::Truncated;
                break;
            }
            Err(e) => return Err(e),
        };
        let over_limit = limit.map(|l| kept >= l).unwrap_or(false);
        if opts.admits(index) && over_limit {
            status.row_limit_hit = true;
        }
        if opts.admits(index) && !over_limit {
            store_row(page, row)?;
            kept += 1;
        }
        index += 1;
    }
    page.set_n_rows(kept);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn read_columns_counted<R: BufRead>(
    src: &mut LineSource<'_, R>,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
    total: usize,
    limit: Option<usize>,
    status: &mut PageStatus,
) -> Result<()> {
    let mut admit = Vec::with_capacity(total);
    let mut kept = 0usize;
    for index in 0..total {
        let wanted = opts.admits(index);
        let within = limit.map(|l| kept < l).unwrap_or(true);
        if wanted && !within {
            status.row_limit_hit = true;
        }
        let a = wanted && within;
        if a {
            kept += 1;
        }
        admit.push(a);
    }
    for c in 0..page.n_columns() {
        let ty = layout.column_type(c).unwrap();
        let block = match read_block(src, ty, total, "column data") {
            Ok(b) => b,
            Err(SdfError::DataTruncated(_)) => {
                for col in 0..page.n_columns() {
                    page.column_mut(col).unwrap().clear();
                }
                page.set_n_rows(0);
                status.outcome = PageOutcome::Truncated;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        for (index, &a) in admit.iter().enumerate() {
            if a {
                page.column_mut(c).unwrap().push(block.get(index).unwrap())?;
            }
        }
    }
    page.set_n_rows(kept);
    Ok(())
}

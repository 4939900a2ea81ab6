//! Binary page codec
//!
//! Little-endian fixed-width encoding. A page is: a 32-bit signed row
//! count, the non-fixed parameters in declaration order, each array as its
//! dimension-size vector followed by its element block, then the column
//! table in row- or column-major order. Strings are length-prefixed with a
//! 32-bit count. In no-row-count files the count field carries the −1
//! sentinel and every row is preceded by a one-byte continuation flag.

use super::{PageOutcome, PageStatus, ReadOptions, WriteOptions};
use crate::error::{Result, SdfError};
use crate::layout::Layout;
use crate::page::{ArrayData, ColumnData, PageBuffer};
use crate::types::{ScalarType, Value};
use std::io::{Read, Write};

/// Row-count sentinel for no-row-count pages
pub const NO_COUNT_SENTINEL: i32 = -1;

fn read_exact_or(r: &mut impl Read, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SdfError::truncated(format!("unexpected end of data in {what}"))
        } else {
            SdfError::Io(e)
        }
    })
}

fn read_i32(r: &mut impl Read, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact_or(r, &mut buf, what)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_value(r: &mut impl Read, ty: ScalarType, what: &str) -> Result<Value> {
    let mut buf = [0u8; 8];
    Ok(match ty {
        ScalarType::I16 => {
            read_exact_or(r, &mut buf[..2], what)?;
            Value::I16(i16::from_le_bytes([buf[0], buf[1]]))
        }
        ScalarType::U16 => {
            read_exact_or(r, &mut buf[..2], what)?;
            Value::U16(u16::from_le_bytes([buf[0], buf[1]]))
        }
        ScalarType::I32 => {
            read_exact_or(r, &mut buf[..4], what)?;
            Value::I32(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
        }
        ScalarType::U32 => {
            read_exact_or(r, &mut buf[..4], what)?;
            Value::U32(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
        }
        ScalarType::I64 => {
            read_exact_or(r, &mut buf, what)?;
            Value::I64(i64::from_le_bytes(buf))
        }
        ScalarType::U64 => {
            read_exact_or(r, &mut buf, what)?;
            Value::U64(u64::from_le_bytes(buf))
        }
        ScalarType::F32 => {
            read_exact_or(r, &mut buf[..4], what)?;
            Value::F32(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
        }
        ScalarType::F64 => {
            read_exact_or(r, &mut buf, what)?;
            Value::F64(f64::from_le_bytes(buf))
        }
        ScalarType::Char => {
            read_exact_or(r, &mut buf[..1], what)?;
            Value::Char(buf[0])
        }
        ScalarType::String => {
            let len = read_i32(r, what)?;
            if len < 0 {
                return Err(SdfError::truncated(format!(
                    "negative string length in {what}"
                )));
            }
            let mut bytes = vec![0u8; len as usize];
            read_exact_or(r, &mut bytes, what)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
    })
}

fn write_value(w: &mut impl Write, value: &Value) -> Result<()> {
    match value {
        Value::I16(v) => w.write_all(&v.to_le_bytes())?,
        Value::U16(v) => w.write_all(&v.to_le_bytes())?,
        Value::I32(v) => w.write_all(&v.to_le_bytes())?,
        Value::U32(v) => w.write_all(&v.to_le_bytes())?,
        Value::I64(v) => w.write_all(&v.to_le_bytes())?,
        Value::U64(v) => w.write_all(&v.to_le_bytes())?,
        Value::F32(v) => w.write_all(&v.to_le_bytes())?,
        Value::F64(v) => w.write_all(&v.to_le_bytes())?,
        Value::Char(c) => w.write_all(&[*c])?,
        Value::String(s) => {
            w.write_all(&(s.len() as i32).to_le_bytes())?;
            w.write_all(s.as_bytes())?;
        }
    }
    Ok(())
}

/// Write one whole column vector; fixed-width data goes out as one block
/// on little-endian targets
fn write_column_block(w: &mut impl Write, data: &ColumnData) -> Result<()> {
    #[cfg(target_endian = "little")]
    {
        let bytes: Option<&[u8]> = match data {
            ColumnData::I16(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::U16(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::I32(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::U32(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::I64(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::U64(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::F32(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::F64(v) => Some(bytemuck::cast_slice(v)),
            ColumnData::Char(v) => Some(v.as_slice()),
            ColumnData::String(_) => None,
        };
        if let Some(bytes) = bytes {
            w.write_all(bytes)?;
            return Ok(());
        }
    }
    for i in 0..data.len() {
        write_value(w, &data.get(i).unwrap())?;
    }
    Ok(())
}

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
            "binary column-major order cannot be combined with no_row_counts",
        ));
    }

    let kept_rows: Vec<usize> = (0..page.n_rows())
        .filter(|&r| page.row_flag(r).unwrap_or(true))
        .collect();

    if mode.no_row_counts {
        w.write_all(&NO_COUNT_SENTINEL.to_le_bytes())?;
    } else {
        w.write_all(&(kept_rows.len() as i32).to_le_bytes())?;
    }

    for (i, def) in layout.parameters().iter().enumerate() {
        if def.fixed_value.is_some() {
            continue;
        }
        let value = match page.parameter_value(i) {
            Some(v) => v.clone(),
            None => Value::default_for(def.data_type),
        };
        write_value(w, &value)?;
    }

    for (i, def) in layout.arrays().iter().enumerate() {
        match page.array_value(i) {
            Some(block) => {
                for d in 0..def.dimensions {
                    let size = block.dims.get(d).copied().unwrap_or(0);
                    w.write_all(&(size as i32).to_le_bytes())?;
                }
                for e in 0..block.data.len() {
                    write_value(w, &block.data.get(e).unwrap())?;
                }
            }
            None => {
                for _ in 0..def.dimensions {
                    w.write_all(&0i32.to_le_bytes())?;
                }
            }
        }
    }

    let kept_cols: Vec<usize> = (0..page.n_columns())
        .filter(|&c| opts.restore_suppressed_columns || page.column_flag(c).unwrap_or(true))
        .collect();

    if mode.column_major {
        for &c in &kept_cols {
            let data = page.column(c).unwrap();
            if !opts.restore_suppressed_columns || page.column_flag(c).unwrap_or(true) {
                if kept_rows.len() == page.n_rows() && data.len() == page.n_rows() {
                    write_column_block(w, data)?;
                } else {
                    for &r in &kept_rows {
                        write_value(w, &cell(data, r))?;
                    }
                }
            } else {
                let default = Value::default_for(data.scalar_type());
                for _ in &kept_rows {
                    write_value(w, &default)?;
                }
            }
        }
    } else {
        for &r in &kept_rows {
            if mode.no_row_counts {
                w.write_all(&[1u8])?;
            }
            for &c in &kept_cols {
                let data = page.column(c).unwrap();
                if !opts.restore_suppressed_columns || page.column_flag(c).unwrap_or(true) {
                    write_value(w, &cell(data, r))?;
                } else {
                    write_value(w, &Value::default_for(data.scalar_type()))?;
                }
            }
        }
        if mode.no_row_counts {
            w.write_all(&[0u8])?;
        }
    }
    Ok(())
}

fn cell(data: &ColumnData, row: usize) -> Value {
    data.get(row)
        .unwrap_or_else(|| Value::default_for(data.scalar_type()))
}

/// Decode the next page into the buffer
///
/// On a truncated page the buffer holds every fully-read row and the
/// status says so; the caller decides whether to surface the partial data.
pub fn read_page<R: Read>(
    r: &mut R,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
) -> Result<PageStatus> {
    let mut count_buf = [0u8; 4];
    match r.read_exact(&mut count_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(PageStatus::end_of_stream());
        }
        Err(e) => return Err(e.into()),
    }
    let declared = i32::from_le_bytes(count_buf);
    if declared < NO_COUNT_SENTINEL {
        return Err(SdfError::truncated(format!(
            "implausible row count {declared}"
        )));
    }
    let counted = if declared == NO_COUNT_SENTINEL {
        if layout.data_mode.column_major {
            return Err(SdfError::truncated(
                "no-row-count page cannot be column-major",
            ));
        }
        None
    } else {
        Some(declared as usize)
    };

    page.start_page(layout, counted.unwrap_or(0));

    for (i, def) in layout.parameters().iter().enumerate() {
        let value = match &def.fixed_value {
            Some(text) => Value::parse(text, def.data_type).map_err(|_| {
                SdfError::usage(format!(
                    "fixed_value {:?} of parameter {:?} does not scan as {}",
                    text, def.name, def.data_type
                ))
            })?,
            None => read_value(r, def.data_type, "parameter data")?,
        };
        page.set_parameter_value(i, value)?;
    }

    for (i, def) in layout.arrays().iter().enumerate() {
        let mut dims = Vec::with_capacity(def.dimensions);
        for _ in 0..def.dimensions {
            let size = read_i32(r, "array dimensions")?;
            if size < 0 {
                return Err(SdfError::truncated("negative array dimension"));
            }
            dims.push(size as usize);
        }
        let elements: usize = dims.iter().product();
        let mut data = ColumnData::with_capacity(def.data_type, elements);
        for _ in 0..elements {
            data.push(read_value(r, def.data_type, "array data")?)?;
        }
        page.set_array_value(i, ArrayData { dims, data })?;
    }

    let mut status = PageStatus::read();
    let limit = opts.row_limit.map(|l| l as usize);

    match counted {
        Some(total) => {
            if layout.data_mode.column_major {
                read_column_major(r, layout, page, opts, total, limit, &mut status)?;
            } else {
                read_row_major(r, layout, page, opts, total, limit, &mut status)?;
            }
        }
        None => {
            // per-row continuation flags
            let mut index = 0usize;
            let mut kept = 0usize;
            loop {
                let mut flag = [0u8; 1];
                match read_exact_or(r, &mut flag, "row flag") {
                    Ok(()) => {}
                    Err(SdfError::DataTruncated(_)) => {
                        status.outcome = PageOutcome::Truncated;
                        break;
                    }
                    Err(e) => return Err(e),
                }
                if flag[0] == 0 {
                    break;
                }
                match read_row(r, layout, page, opts, index, kept, limit, &mut status) {
                    Ok(stored) => {
                        if stored {
                            kept += 1;
                        }
                    }
                    Err(SdfError::DataTruncated(_)) => {
                        status.outcome = PageOutcome::Truncated;
                        break;
                    }
                    Err(e) => return Err(e),
                }
                index += 1;
            }
            page.set_n_rows(kept);
        }
    }
    Ok(status)
}

fn read_row_major<R: Read>(
    r: &mut R,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
    total: usize,
    limit: Option<usize>,
    status: &mut PageStatus,
) -> Result<()> {
    let mut kept = 0usize;
    for index in 0..total {
        match read_row(r, layout, page, opts, index, kept, limit, status) {
            Ok(stored) => {
                if stored {
                    kept += 1;
                }
            }
            Err(SdfError::DataTruncated(_)) => {
                status.outcome = PageOutcome::Truncated;
                break;
            }
            Err(e) => return Err(e),
        }
    }
    page.set_n_rows(kept);
    Ok(())
}

/// Decode one row, returning whether it was stored
///
/// Cells are staged before being pushed, so a mid-row truncation never
/// leaves ragged columns behind.
#[allow(clippy::too_many_arguments)]
fn read_row<R: Read>(
    r: &mut R,
    layout: &Layout,
    page: &mut PageBuffer,
    opts: &ReadOptions,
    index: usize,
    kept_so_far: usize,
    limit: Option<usize>,
    status: &mut PageStatus,
) -> Result<bool> {
    let over_limit = limit.map(|l| kept_so_far >= l).unwrap_or(false);
    let keep = opts.admits(index) && !over_limit;
    if over_limit && opts.admits(index) {
        status.row_limit_hit = true;
    }
    let mut row = Vec::with_capacity(page.n_columns());
    for c in 0..page.n_columns() {
        let ty = layout.column_type(c).unwrap();
        row.push(read_value(r, ty, "column data")?);
    }
    if keep {
        for (c, value) in row.into_iter().enumerate() {
            page.column_mut(c).unwrap().push(value)?;
        }
    }
    Ok(keep)
}

fn read_column_major<R: Read>(
    r: &mut R,
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
        for &a in &admit {
            match read_value(r, ty, "column data") {
                Ok(value) => {
                    if a {
                        page.column_mut(c).unwrap().push(value)?;
                    }
                }
                Err(SdfError::DataTruncated(_)) => {
                    // partial column blocks cannot be squared into rows
                    for col in 0..page.n_columns() {
                        page.column_mut(col).unwrap().clear();
                    }
                    page.set_n_rows(0);
                    status.outcome = PageOutcome::Truncated;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
    page.set_n_rows(kept);
    Ok(())
}

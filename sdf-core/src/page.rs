//! Page buffer: per-page values for parameters, columns, and arrays
//!
//! The buffer holds one scalar slot per declared parameter, a rectangular
//! table for the declared columns, and a dimensioned block per declared
//! array, plus the row- and column-of-interest flag vectors. It never owns
//! the layout; methods that need type information take the layout as an
//! argument, and the layout always outlives the pages read or written
//! against it.

use crate::error::{Result, SdfError};
use crate::layout::{EntityKind, Layout};
use crate::types::{ScalarType, Value};

/// Typed storage for one column (or one array's element block)
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Char(Vec<u8>),
    String(Vec<String>),
}

impl ColumnData {
    pub fn with_capacity(ty: ScalarType, capacity: usize) -> Self {
        match ty {
            ScalarType::I16 => ColumnData::I16(Vec::with_capacity(capacity)),
            ScalarType::U16 => ColumnData::U16(Vec::with_capacity(capacity)),
            ScalarType::I32 => ColumnData::I32(Vec::with_capacity(capacity)),
            ScalarType::U32 => ColumnData::U32(Vec::with_capacity(capacity)),
            ScalarType::I64 => ColumnData::I64(Vec::with_capacity(capacity)),
            ScalarType::U64 => ColumnData::U64(Vec::with_capacity(capacity)),
            ScalarType::F32 => ColumnData::F32(Vec::with_capacity(capacity)),
            ScalarType::F64 => ColumnData::F64(Vec::with_capacity(capacity)),
            ScalarType::Char => ColumnData::Char(Vec::with_capacity(capacity)),
            ScalarType::String => ColumnData::String(Vec::with_capacity(capacity)),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ColumnData::I16(_) => ScalarType::I16,
            ColumnData::U16(_) => ScalarType::U16,
            ColumnData::I32(_) => ScalarType::I32,
            ColumnData::U32(_) => ScalarType::U32,
            ColumnData::I64(_) => ScalarType::I64,
            ColumnData::U64(_) => ScalarType::U64,
            ColumnData::F32(_) => ScalarType::F32,
            ColumnData::F64(_) => ScalarType::F64,
            ColumnData::Char(_) => ScalarType::Char,
            ColumnData::String(_) => ScalarType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::I16(v) => v.len(),
            ColumnData::U16(v) => v.len(),
            ColumnData::I32(v) => v.len(),
            ColumnData::U32(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::U64(v) => v.len(),
            ColumnData::F32(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::Char(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            ColumnData::I16(v) => v.clear(),
            ColumnData::U16(v) => v.clear(),
            ColumnData::I32(v) => v.clear(),
            ColumnData::U32(v) => v.clear(),
            ColumnData::I64(v) => v.clear(),
            ColumnData::U64(v) => v.clear(),
            ColumnData::F32(v) => v.clear(),
            ColumnData::F64(v) => v.clear(),
            ColumnData::Char(v) => v.clear(),
            ColumnData::String(v) => v.clear(),
        }
    }

    pub fn truncate(&mut self, n: usize) {
        match self {
            ColumnData::I16(v) => v.truncate(n),
            ColumnData::U16(v) => v.truncate(n),
            ColumnData::I32(v) => v.truncate(n),
            ColumnData::U32(v) => v.truncate(n),
            ColumnData::I64(v) => v.truncate(n),
            ColumnData::U64(v) => v.truncate(n),
            ColumnData::F32(v) => v.truncate(n),
            ColumnData::F64(v) => v.truncate(n),
            ColumnData::Char(v) => v.truncate(n),
            ColumnData::String(v) => v.truncate(n),
        }
    }

    /// Append a value; the variant must already match
    pub fn push(&mut self, value: Value) -> Result<()> {
        match (self, value) {
            (ColumnData::I16(v), Value::I16(x)) => v.push(x),
            (ColumnData::U16(v), Value::U16(x)) => v.push(x),
            (ColumnData::I32(v), Value::I32(x)) => v.push(x),
            (ColumnData::U32(v), Value::U32(x)) => v.push(x),
            (ColumnData::I64(v), Value::I64(x)) => v.push(x),
            (ColumnData::U64(v), Value::U64(x)) => v.push(x),
            (ColumnData::F32(v), Value::F32(x)) => v.push(x),
            (ColumnData::F64(v), Value::F64(x)) => v.push(x),
            (ColumnData::Char(v), Value::Char(x)) => v.push(x),
            (ColumnData::String(v), Value::String(x)) => v.push(x),
            (col, value) => {
                return Err(SdfError::TypeMismatch {
                    kind: EntityKind::Column,
                    name: String::new(),
                    declared: col.scalar_type(),
                    requested: value.scalar_type(),
                })
            }
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            ColumnData::I16(v) => v.get(index).map(|x| Value::I16(*x)),
            ColumnData::U16(v) => v.get(index).map(|x| Value::U16(*x)),
            ColumnData::I32(v) => v.get(index).map(|x| Value::I32(*x)),
            ColumnData::U32(v) => v.get(index).map(|x| Value::U32(*x)),
            ColumnData::I64(v) => v.get(index).map(|x| Value::I64(*x)),
            ColumnData::U64(v) => v.get(index).map(|x| Value::U64(*x)),
            ColumnData::F32(v) => v.get(index).map(|x| Value::F32(*x)),
            ColumnData::F64(v) => v.get(index).map(|x| Value::F64(*x)),
            ColumnData::Char(v) => v.get(index).map(|x| Value::Char(*x)),
            ColumnData::String(v) => v.get(index).map(|x| Value::String(x.clone())),
        }
    }

    /// Overwrite one slot, extending with defaults when the index is past
    /// the current length
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        while self.len() <= index {
            self.push(Value::default_for(self.scalar_type()))?;
        }
        match (self, value) {
            (ColumnData::I16(v), Value::I16(x)) => v[index] = x,
            (ColumnData::U16(v), Value::U16(x)) => v[index] = x,
            (ColumnData::I32(v), Value::I32(x)) => v[index] = x,
            (ColumnData::U32(v), Value::U32(x)) => v[index] = x,
            (ColumnData::I64(v), Value::I64(x)) => v[index] = x,
            (ColumnData::U64(v), Value::U64(x)) => v[index] = x,
            (ColumnData::F32(v), Value::F32(x)) => v[index] = x,
            (ColumnData::F64(v), Value::F64(x)) => v[index] = x,
            (ColumnData::Char(v), Value::Char(x)) => v[index] = x,
            (ColumnData::String(v), Value::String(x)) => v[index] = x,
            (col, value) => {
                return Err(SdfError::TypeMismatch {
                    kind: EntityKind::Column,
                    name: String::new(),
                    declared: col.scalar_type(),
                    requested: value.scalar_type(),
                })
            }
        }
        Ok(())
    }

    /// Keep only the flagged slots
    pub fn retain_flagged(&mut self, flags: &[bool]) {
        fn retain<T>(v: &mut Vec<T>, flags: &[bool]) {
            let mut i = 0;
            v.retain(|_| {
                let keep = flags.get(i).copied().unwrap_or(true);
                i += 1;
                keep
            });
        }
        match self {
            ColumnData::I16(v) => retain(v, flags),
            ColumnData::U16(v) => retain(v, flags),
            ColumnData::I32(v) => retain(v, flags),
            ColumnData::U32(v) => retain(v, flags),
            ColumnData::I64(v) => retain(v, flags),
            ColumnData::U64(v) => retain(v, flags),
            ColumnData::F32(v) => retain(v, flags),
            ColumnData::F64(v) => retain(v, flags),
            ColumnData::Char(v) => retain(v, flags),
            ColumnData::String(v) => retain(v, flags),
        }
    }
}

/// One array's per-page payload: dimension sizes plus the element block
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    pub dims: Vec<usize>,
    pub data: ColumnData,
}

impl ArrayData {
    pub fn elements(&self) -> usize {
        self.dims.iter().product()
    }
}

/// Values of the current page, owned by the stream positioned at it
#[derive(Debug, Clone)]
pub struct PageBuffer {
    page_number: u32,
    n_rows: usize,
    capacity: usize,
    parameters: Vec<Option<Value>>,
    columns: Vec<ColumnData>,
    arrays: Vec<Option<ArrayData>>,
    row_flags: Vec<bool>,
    column_flags: Vec<bool>,
}

impl PageBuffer {
    /// An empty buffer shaped for the given layout
    pub fn new(layout: &Layout) -> Self {
        let mut page = PageBuffer {
            page_number: 0,
            n_rows: 0,
            capacity: 0,
            parameters: Vec::new(),
            columns: Vec::new(),
            arrays: Vec::new(),
            row_flags: Vec::new(),
            column_flags: Vec::new(),
        };
        page.start_page(layout, 0);
        page
    }

    /// Reset the buffer for a new page with the given row capacity
    ///
    /// All parameter slots become unset, column storage is reallocated at
    /// the requested capacity, array blocks are dropped, and both flag
    /// vectors reset to all-set.
    pub fn start_page(&mut self, layout: &Layout, capacity: usize) {
        self.n_rows = 0;
        self.capacity = capacity;
        self.parameters.clear();
        self.parameters.resize(layout.n_parameters(), None);
        self.columns.clear();
        for col in layout.columns() {
            self.columns.push(ColumnData::with_capacity(col.data_type, capacity));
        }
        self.arrays.clear();
        self.arrays.resize(layout.n_arrays(), None);
        self.row_flags.clear();
        self.row_flags.resize(capacity, true);
        self.column_flags.clear();
        self.column_flags.resize(layout.n_columns(), true);
    }

    /// Drop all values but keep the page shape and capacity
    pub fn clear(&mut self) {
        for p in &mut self.parameters {
            *p = None;
        }
        for c in &mut self.columns {
            c.clear();
        }
        for a in &mut self.arrays {
            *a = None;
        }
        self.n_rows = 0;
        self.row_flags.clear();
        self.row_flags.resize(self.capacity, true);
        for f in &mut self.column_flags {
            *f = true;
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn set_page_number(&mut self, n: u32) {
        self.page_number = n;
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Set the effective row count, growing the row-flag vector as needed
    pub fn set_n_rows(&mut self, n: usize) {
        self.n_rows = n;
        if self.row_flags.len() < n {
            self.row_flags.resize(n, true);
        }
        if self.capacity < n {
            self.capacity = n;
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow the row capacity by `additional` rows
    pub fn lengthen(&mut self, additional: usize) {
        self.capacity += additional;
        self.row_flags.resize(self.capacity.max(self.row_flags.len()), true);
    }

    /// Clip the page to at most `rows` rows
    pub fn shorten(&mut self, rows: usize) {
        for c in &mut self.columns {
            c.truncate(rows);
        }
        self.n_rows = self.n_rows.min(rows);
        self.capacity = self.capacity.min(rows);
        self.row_flags.truncate(rows);
    }

    // --- parameters ---

    pub fn parameter_value(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index).and_then(|v| v.as_ref())
    }

    pub fn set_parameter_value(&mut self, index: usize, value: Value) -> Result<()> {
        let slot = self
            .parameters
            .get_mut(index)
            .ok_or_else(|| SdfError::usage(format!("parameter index {index} out of range")))?;
        *slot = Some(value);
        Ok(())
    }

    // --- columns ---

    pub fn column(&self, index: usize) -> Option<&ColumnData> {
        self.columns.get(index)
    }

    pub fn column_mut(&mut self, index: usize) -> Option<&mut ColumnData> {
        self.columns.get_mut(index)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Replace a column's storage wholesale; the variant must match the
    /// declared type and the length must agree with the page's row count
    pub fn replace_column(&mut self, index: usize, data: ColumnData) -> Result<()> {
        let slot = self
            .columns
            .get_mut(index)
            .ok_or_else(|| SdfError::usage(format!("column index {index} out of range")))?;
        if slot.scalar_type() != data.scalar_type() {
            return Err(SdfError::TypeMismatch {
                kind: EntityKind::Column,
                name: String::new(),
                declared: slot.scalar_type(),
                requested: data.scalar_type(),
            });
        }
        *slot = data;
        Ok(())
    }

    // --- arrays ---

    pub fn array_value(&self, index: usize) -> Option<&ArrayData> {
        self.arrays.get(index).and_then(|v| v.as_ref())
    }

    pub fn set_array_value(&mut self, index: usize, data: ArrayData) -> Result<()> {
        let slot = self
            .arrays
            .get_mut(index)
            .ok_or_else(|| SdfError::usage(format!("array index {index} out of range")))?;
        *slot = Some(data);
        Ok(())
    }

    // --- row flags ---

    /// Set every row flag to the given state
    pub fn set_row_flags(&mut self, state: bool) {
        for f in &mut self.row_flags {
            *f = state;
        }
    }

    /// Set one row's flag
    pub fn set_row_flag(&mut self, row: usize, state: bool) -> Result<()> {
        if row >= self.n_rows.max(self.row_flags.len()) {
            return Err(SdfError::usage(format!("row {row} out of range")));
        }
        if row >= self.row_flags.len() {
            self.row_flags.resize(row + 1, true);
        }
        self.row_flags[row] = state;
        Ok(())
    }

    /// Apply a flag slice starting at row 0; later individual clears or
    /// asserts override these
    pub fn assert_row_flags(&mut self, flags: &[bool]) {
        for (i, f) in flags.iter().enumerate() {
            if i >= self.row_flags.len() {
                self.row_flags.resize(i + 1, true);
            }
            self.row_flags[i] = *f;
        }
    }

    pub fn row_flag(&self, row: usize) -> Option<bool> {
        self.row_flags.get(row).copied()
    }

    /// Flags for the effective rows of the page
    pub fn row_flags(&self) -> &[bool] {
        &self.row_flags[..self.n_rows.min(self.row_flags.len())]
    }

    /// Population count of the row flag vector over the effective rows
    pub fn count_rows_of_interest(&self) -> usize {
        self.row_flags().iter().filter(|f| **f).count()
    }

    /// Clear flags on rows whose value in the given column falls outside
    /// (or, inverted, inside) the closed window
    ///
    /// Returns the remaining number of rows of interest.
    pub fn filter_rows_by_window(
        &mut self,
        column: usize,
        lower: f64,
        upper: f64,
        invert: bool,
    ) -> Result<usize> {
        let data = self
            .columns
            .get(column)
            .ok_or_else(|| SdfError::usage(format!("column index {column} out of range")))?;
        if !data.scalar_type().is_numeric() && data.scalar_type() != ScalarType::Char {
            return Err(SdfError::TypeMismatch {
                kind: EntityKind::Column,
                name: String::new(),
                declared: data.scalar_type(),
                requested: ScalarType::F64,
            });
        }
        let mut inside = Vec::with_capacity(self.n_rows);
        for row in 0..self.n_rows {
            let v = data.get(row).and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
            inside.push(v >= lower && v <= upper);
        }
        for (row, keep) in inside.into_iter().enumerate() {
            if keep == invert {
                self.row_flags[row] = false;
            }
        }
        Ok(self.count_rows_of_interest())
    }

    // --- column flags ---

    pub fn set_column_flags(&mut self, state: bool) {
        for f in &mut self.column_flags {
            *f = state;
        }
    }

    pub fn set_column_flag(&mut self, column: usize, state: bool) -> Result<()> {
        let f = self
            .column_flags
            .get_mut(column)
            .ok_or_else(|| SdfError::usage(format!("column index {column} out of range")))?;
        *f = state;
        Ok(())
    }

    pub fn column_flag(&self, column: usize) -> Option<bool> {
        self.column_flags.get(column).copied()
    }

    pub fn column_flags(&self) -> &[bool] {
        &self.column_flags
    }

    pub fn count_columns_of_interest(&self) -> usize {
        self.column_flags.iter().filter(|f| **f).count()
    }

    /// Physically drop rows whose flag is cleared and reset the flags
    pub fn delete_unset_rows(&mut self) {
        let flags: Vec<bool> = self.row_flags().to_vec();
        for c in &mut self.columns {
            c.retain_flagged(&flags);
        }
        self.n_rows = flags.iter().filter(|f| **f).count();
        self.row_flags.clear();
        self.row_flags.resize(self.n_rows.max(self.capacity), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameValidity;
    use crate::layout::ColumnDef;

    fn layout() -> Layout {
        let mut l = Layout::with_validity(NameValidity::Strict);
        l.define_column(ColumnDef::new("x", ScalarType::F64)).unwrap();
        l.define_column(ColumnDef::new("n", ScalarType::I32)).unwrap();
        l
    }

    fn page_with_rows(l: &Layout, rows: usize) -> PageBuffer {
        let mut p = PageBuffer::new(l);
        p.start_page(l, rows);
        for i in 0..rows {
            p.column_mut(0).unwrap().push(Value::F64(i as f64)).unwrap();
            p.column_mut(1).unwrap().push(Value::I32(i as i32)).unwrap();
        }
        p.set_n_rows(rows);
        p
    }

    #[test]
    fn test_count_rows_of_interest_is_popcount() {
        let l = layout();
        let mut p = page_with_rows(&l, 5);
        assert_eq!(p.count_rows_of_interest(), 5);
        p.set_row_flag(1, false).unwrap();
        p.set_row_flag(3, false).unwrap();
        assert_eq!(p.count_rows_of_interest(), 3);
        p.set_row_flags(true);
        assert_eq!(p.count_rows_of_interest(), 5);
    }

    #[test]
    fn test_assert_then_individual_clear() {
        let l = layout();
        let mut p = page_with_rows(&l, 4);
        p.assert_row_flags(&[true, true, false, false]);
        p.set_row_flag(0, false).unwrap();
        p.set_row_flag(3, true).unwrap();
        let flags: Vec<bool> = (0..4).map(|i| p.row_flag(i).unwrap()).collect();
        assert_eq!(flags, vec![false, true, false, true]);
    }

    #[test]
    fn test_window_filter() {
        let l = layout();
        let mut p = page_with_rows(&l, 6);
        let kept = p.filter_rows_by_window(0, 1.0, 3.0, false).unwrap();
        assert_eq!(kept, 3); // rows 1, 2, 3
        assert_eq!(p.row_flag(0), Some(false));
        assert_eq!(p.row_flag(2), Some(true));
    }

    #[test]
    fn test_delete_unset_rows() {
        let l = layout();
        let mut p = page_with_rows(&l, 4);
        p.set_row_flag(0, false).unwrap();
        p.set_row_flag(2, false).unwrap();
        p.delete_unset_rows();
        assert_eq!(p.n_rows(), 2);
        assert_eq!(p.column(0).unwrap().get(0), Some(Value::F64(1.0)));
        assert_eq!(p.column(0).unwrap().get(1), Some(Value::F64(3.0)));
        assert_eq!(p.count_rows_of_interest(), 2);
    }

    #[test]
    fn test_start_page_resets_state() {
        let l = layout();
        let mut p = page_with_rows(&l, 3);
        p.set_row_flag(0, false).unwrap();
        p.set_column_flag(1, false).unwrap();
        p.start_page(&l, 2);
        assert_eq!(p.n_rows(), 0);
        assert_eq!(p.count_columns_of_interest(), 2);
        assert!(p.column(0).unwrap().is_empty());
        assert!(p.parameter_value(0).is_none());
    }
}

//! Input stream controller and accessor surface
//!
//! A reader owns its byte source, the layout parsed from the header, and
//! the buffer for the page it is positioned at. Pages are decoded
//! sequentially; page filters, the row limit, and sparse row selection are
//! applied during [`SdfReader::read_page`]. On seekable sources page byte
//! offsets are recorded so previously read pages can be revisited.

use crate::diagnostics::ErrorQueue;
use crate::source::ByteSource;
use sdf_core::codec::{ascii, binary, text, PageOutcome, ReadOptions};
use sdf_core::header;
use sdf_core::layout::EntityKind;
use sdf_core::page::{ArrayData, ColumnData};
use sdf_core::{FileMode, Layout, PageBuffer, Result, ScalarType, SdfConfig, SdfError, Value};
use std::path::Path;

/// What a call to [`SdfReader::read_page`] produced
///
/// The three cases correspond to the positive / zero / negative contract
/// of the wire protocol: a page number, recoverable corruption, or the
/// terminal end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A page was read; 1-indexed physical page number
    Page(u32),
    /// The page was truncated mid-row; partial data is available if the
    /// reader opts in via [`SdfReader::accept_recovered_page`]
    Truncated,
    /// No more pages
    EndOfStream,
}

/// Page inclusion and exclusion constraints, evaluated before a decoded
/// page is handed to the caller
#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    pub from_page: Option<u32>,
    pub to_page: Option<u32>,
    /// When present, only these physical page numbers are kept
    pub keep_pages: Option<Vec<u32>>,
    pub remove_pages: Vec<u32>,
}

impl PageFilter {
    pub fn admits(&self, page: u32) -> bool {
        if self.from_page.map(|p| page < p).unwrap_or(false) {
            return false;
        }
        if self.to_page.map(|p| page > p).unwrap_or(false) {
            return false;
        }
        if let Some(keep) = &self.keep_pages {
            if !keep.contains(&page) {
                return false;
            }
        }
        !self.remove_pages.contains(&page)
    }

    /// Whether no page at or beyond this number can be admitted
    pub fn exhausted(&self, page: u32) -> bool {
        let mut bound = self.to_page;
        if let Some(keep) = &self.keep_pages {
            let max_keep = keep.iter().copied().max().unwrap_or(0);
            bound = Some(bound.map_or(max_keep, |b| b.min(max_keep)));
        }
        bound.map(|b| page > b).unwrap_or(false)
    }
}

/// Class of types an existence check accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Any,
    Numeric,
    Integer,
    Float,
    Exact(ScalarType),
}

impl TypeClass {
    fn matches(self, ty: ScalarType) -> bool {
        match self {
            TypeClass::Any => true,
            TypeClass::Numeric => ty.is_numeric(),
            TypeClass::Integer => ty.is_integer(),
            TypeClass::Float => ty.is_float(),
            TypeClass::Exact(want) => ty == want,
        }
    }
}

/// Graded verdict of [`SdfReader::check_column`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Okay,
    NonExistent,
    WrongType,
    WrongUnits,
}

/// Sequential reader over one SDF input
pub struct SdfReader {
    layout: Layout,
    page: PageBuffer,
    source: ByteSource,
    config: SdfConfig,
    filter: PageFilter,
    errors: ErrorQueue,
    pages_read: u32,
    page_offsets: Vec<u64>,
    eof: bool,
    recovery_possible: bool,
}

impl SdfReader {
    /// Open a file for buffered sequential reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(ByteSource::open(path)?, sdf_core::default_config())
    }

    /// Open a file with explicit configuration
    pub fn open_with(path: impl AsRef<Path>, config: SdfConfig) -> Result<Self> {
        Self::from_source(ByteSource::open(path)?, config)
    }

    /// Open a file memory-mapped for cheap page seeking
    #[cfg(feature = "mmap")]
    pub fn open_mapped(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(ByteSource::open_mapped(path)?, sdf_core::default_config())
    }

    /// Read from standard input
    pub fn from_stdin() -> Result<Self> {
        Self::from_source(ByteSource::stdin(), sdf_core::default_config())
    }

    /// Wrap any byte source; the header is parsed immediately and the
    /// stream is left positioned before the first page
    pub fn from_source(mut source: ByteSource, config: SdfConfig) -> Result<Self> {
        let layout = header::read_layout(&mut source, config.name_validity)?;
        let page = PageBuffer::new(&layout);
        Ok(SdfReader {
            layout,
            page,
            source,
            config,
            filter: PageFilter::default(),
            errors: ErrorQueue::new(),
            pages_read: 0,
            page_offsets: Vec::new(),
            eof: false,
            recovery_possible: false,
        })
    }

    /// Install page inclusion/exclusion constraints for subsequent reads
    pub fn set_page_filter(&mut self, filter: PageFilter) {
        self.filter = filter;
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The page buffer the stream is currently positioned at
    pub fn current_page(&self) -> &PageBuffer {
        &self.page
    }

    pub fn config(&self) -> &SdfConfig {
        &self.config
    }

    /// Description text and contents from the header
    pub fn description(&self) -> (Option<&str>, Option<&str>) {
        (self.layout.description.as_deref(), self.layout.contents.as_deref())
    }

    /// Physical number of the current page; 0 before the first read
    pub fn page_number(&self) -> u32 {
        self.page.page_number()
    }

    pub fn n_rows(&self) -> usize {
        self.page.n_rows()
    }

    pub fn count_rows_of_interest(&self) -> usize {
        self.page.count_rows_of_interest()
    }

    pub fn count_columns_of_interest(&self) -> usize {
        self.page.count_columns_of_interest()
    }

    // --- page sequencing ---

    /// Read the next admitted page
    pub fn read_page(&mut self) -> Result<ReadOutcome> {
        self.read_page_sparse(1, 0)
    }

    /// Read the next admitted page keeping every `interval`-th row
    /// starting at `offset`
    pub fn read_page_sparse(&mut self, interval: usize, offset: usize) -> Result<ReadOutcome> {
        let opts = ReadOptions {
            row_limit: self.config.row_limit,
            sparse_interval: interval.max(1),
            sparse_offset: offset,
        };
        loop {
            if self.eof {
                return Ok(ReadOutcome::EndOfStream);
            }
            if self.filter.exhausted(self.pages_read + 1) {
                self.eof = true;
                return Ok(ReadOutcome::EndOfStream);
            }
            let status = self.decode_next(&opts)?;
            match status.outcome {
                PageOutcome::EndOfStream => {
                    self.eof = true;
                    return Ok(ReadOutcome::EndOfStream);
                }
                PageOutcome::Truncated => {
                    self.pages_read += 1;
                    self.page.set_page_number(self.pages_read);
                    self.eof = true;
                    let soft = SdfError::truncated(format!(
                        "page {} ended mid-row; {} full rows are recoverable",
                        self.pages_read,
                        self.page.n_rows()
                    ));
                    self.errors.warn(soft.tag(), soft.to_string());
                    if self.config.auto_recover {
                        self.recovery_possible = false;
                        return Ok(ReadOutcome::Page(self.pages_read));
                    }
                    self.recovery_possible = true;
                    return Ok(ReadOutcome::Truncated);
                }
                PageOutcome::Read => {
                    self.pages_read += 1;
                    self.page.set_page_number(self.pages_read);
                    self.recovery_possible = false;
                    if status.row_limit_hit {
                        let soft = SdfError::RowLimitHit {
                            limit: self.config.row_limit.unwrap_or(0),
                        };
                        self.errors.warn(soft.tag(), soft.to_string());
                    }
                    if self.filter.admits(self.pages_read) {
                        return Ok(ReadOutcome::Page(self.pages_read));
                    }
                    // filtered out; decode the next one
                }
            }
        }
    }

    fn decode_next(&mut self, opts: &ReadOptions) -> Result<sdf_core::PageStatus> {
        if self.source.is_seekable() && self.pages_read as usize == self.page_offsets.len() {
            if let Some(pos) = self.source.position()? {
                self.page_offsets.push(pos);
            }
        }
        let first_page = self.pages_read == 0;
        let status = match self.layout.data_mode.mode {
            FileMode::Binary => {
                binary::read_page(&mut self.source, &self.layout, &mut self.page, opts)
            }
            FileMode::Ascii => {
                ascii::read_page(&mut self.source, &self.layout, &mut self.page, opts, first_page)
            }
        };
        match status {
            Ok(s) => Ok(s),
            // truncation outside the row section is still the soft zero;
            // whatever the buffer holds is the recoverable partial page
            Err(SdfError::DataTruncated(_)) => Ok(sdf_core::PageStatus {
                outcome: PageOutcome::Truncated,
                row_limit_hit: false,
            }),
            Err(e) => {
                self.eof = true;
                Err(self.errors.record(e))
            }
        }
    }

    /// Whether a truncated page's partial data is available
    pub fn recovery_possible(&self) -> bool {
        self.recovery_possible
    }

    /// Consume the partial data of a truncated page as the current page
    ///
    /// Returns its physical page number, as `read_page` would have.
    pub fn accept_recovered_page(&mut self) -> Result<u32> {
        if !self.recovery_possible {
            return Err(self
                .errors
                .record(SdfError::usage("no recoverable page is pending")));
        }
        self.recovery_possible = false;
        Ok(self.pages_read)
    }

    /// Reposition so the next read returns the given physical page
    ///
    /// Only file-backed sources support this. Seeking forward decodes and
    /// discards intervening pages; seeking backward uses recorded offsets.
    pub fn goto_page(&mut self, target: u32) -> Result<()> {
        if target == 0 {
            return Err(self.errors.record(SdfError::usage("pages are 1-indexed")));
        }
        if !self.source.is_seekable() {
            return Err(self
                .errors
                .record(SdfError::usage("goto_page requires a seekable input")));
        }
        if (target as usize) <= self.page_offsets.len() {
            self.source.seek_to(self.page_offsets[target as usize - 1])?;
            self.pages_read = target - 1;
            self.eof = false;
            self.recovery_possible = false;
            return Ok(());
        }
        let opts = ReadOptions {
            row_limit: self.config.row_limit,
            ..ReadOptions::default()
        };
        while self.pages_read + 1 < target {
            if self.eof {
                return Err(self
                    .errors
                    .record(SdfError::usage(format!("page {target} is beyond the end"))));
            }
            let status = self.decode_next(&opts)?;
            match status.outcome {
                PageOutcome::Read => {
                    self.pages_read += 1;
                    self.page.set_page_number(self.pages_read);
                }
                _ => {
                    self.eof = true;
                    return Err(self
                        .errors
                        .record(SdfError::usage(format!("page {target} is beyond the end"))));
                }
            }
        }
        Ok(())
    }

    /// Close the stream, releasing the source
    pub fn terminate(self) -> Result<()> {
        drop(self.source);
        Ok(())
    }

    // --- diagnostics ---

    pub fn diagnostics(&mut self) -> &mut ErrorQueue {
        &mut self.errors
    }

    pub fn n_errors(&self) -> usize {
        self.errors.len()
    }

    // --- lookup helpers ---

    fn ensure_page(&mut self) -> Result<()> {
        if self.page.page_number() == 0 {
            return Err(self
                .errors
                .record(SdfError::usage("no page has been read yet")));
        }
        Ok(())
    }

    fn parameter_slot(&mut self, name: &str) -> Result<usize> {
        match self.layout.parameter_index(name) {
            Some(at) => Ok(at),
            None => Err(self.errors.record(SdfError::NameUnknown {
                kind: EntityKind::Parameter,
                name: name.to_string(),
            })),
        }
    }

    fn column_slot(&mut self, name: &str) -> Result<usize> {
        match self.layout.column_index(name) {
            Some(at) => Ok(at),
            None => Err(self.errors.record(SdfError::NameUnknown {
                kind: EntityKind::Column,
                name: name.to_string(),
            })),
        }
    }

    fn array_slot(&mut self, name: &str) -> Result<usize> {
        match self.layout.array_index(name) {
            Some(at) => Ok(at),
            None => Err(self.errors.record(SdfError::NameUnknown {
                kind: EntityKind::Array,
                name: name.to_string(),
            })),
        }
    }

    // --- parameter access ---

    /// Current value of a parameter
    pub fn parameter(&mut self, name: &str) -> Result<Value> {
        self.ensure_page()?;
        let at = self.parameter_slot(name)?;
        match self.page.parameter_value(at) {
            Some(v) => Ok(v.clone()),
            None => {
                let ty = self.layout.parameter_at(at).unwrap().data_type;
                Ok(Value::default_for(ty))
            }
        }
    }

    /// Parameter converted to `f64`
    pub fn parameter_as_f64(&mut self, name: &str) -> Result<f64> {
        let value = self.parameter(name)?;
        match value.convert(ScalarType::F64) {
            Ok(v) => Ok(v.as_f64().unwrap()),
            Err(e) => Err(self.errors.record(e)),
        }
    }

    /// Parameter converted to `i64`
    pub fn parameter_as_i64(&mut self, name: &str) -> Result<i64> {
        let value = self.parameter(name)?;
        match value.convert(ScalarType::I64) {
            Ok(v) => Ok(v.as_i64().unwrap()),
            Err(e) => Err(self.errors.record(e)),
        }
    }

    /// Parameter rendered with its declared format string
    pub fn parameter_as_string(&mut self, name: &str) -> Result<String> {
        self.ensure_page()?;
        let at = self.parameter_slot(name)?;
        let def = self.layout.parameter_at(at).unwrap();
        let format = def.format_string.clone();
        let value = match self.page.parameter_value(at) {
            Some(v) => v.clone(),
            None => Value::default_for(def.data_type),
        };
        if let Value::String(s) = &value {
            return Ok(s.clone());
        }
        let mut out = String::new();
        text::push_value(&mut out, &value, format.as_deref());
        Ok(out)
    }

    // --- column access ---

    /// Values of a column for the rows of interest
    pub fn column_values(&mut self, name: &str) -> Result<Vec<Value>> {
        self.ensure_page()?;
        let at = self.column_slot(name)?;
        let data = self.page.column(at).unwrap();
        let flags = self.page.row_flags();
        let mut out = Vec::with_capacity(self.page.count_rows_of_interest());
        for row in 0..self.page.n_rows() {
            if flags.get(row).copied().unwrap_or(true) {
                out.push(data.get(row).unwrap());
            }
        }
        Ok(out)
    }

    /// Column converted to doubles, rows of interest only
    pub fn column_as_f64(&mut self, name: &str) -> Result<Vec<f64>> {
        let at = self.column_slot(name)?;
        let declared = self.layout.column_type(at).unwrap();
        if !declared.is_numeric() && declared != ScalarType::Char {
            return Err(self.errors.record(SdfError::TypeMismatch {
                kind: EntityKind::Column,
                name: name.to_string(),
                declared,
                requested: ScalarType::F64,
            }));
        }
        let values = self.column_values(name)?;
        Ok(values.into_iter().map(|v| v.as_f64().unwrap()).collect())
    }

    /// Column converted to 32-bit integers, rows of interest only
    pub fn column_as_i32(&mut self, name: &str) -> Result<Vec<i32>> {
        let values = self.column_values(name)?;
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            match v.convert_lossy(ScalarType::I32) {
                Ok(Value::I32(x)) => out.push(x),
                Ok(_) => unreachable!(),
                Err(e) => return Err(self.errors.record(e)),
            }
        }
        Ok(out)
    }

    /// Column rendered as strings, rows of interest only
    pub fn column_as_strings(&mut self, name: &str) -> Result<Vec<String>> {
        let values = self.column_values(name)?;
        Ok(values.into_iter().map(|v| v.to_plain_string()).collect())
    }

    /// Borrow a column's full storage, all rows regardless of flags
    ///
    /// The borrow is valid until the next page transition.
    pub fn internal_column(&mut self, name: &str) -> Result<&ColumnData> {
        self.ensure_page()?;
        let at = self.column_slot(name)?;
        Ok(self.page.column(at).unwrap())
    }

    /// One row's values across the columns of interest
    pub fn row(&mut self, row: usize) -> Result<Vec<Value>> {
        self.ensure_page()?;
        if row >= self.page.n_rows() {
            return Err(self
                .errors
                .record(SdfError::usage(format!("row {row} out of range"))));
        }
        let mut out = Vec::new();
        for c in 0..self.page.n_columns() {
            if self.page.column_flag(c).unwrap_or(true) {
                out.push(self.page.column(c).unwrap().get(row).unwrap());
            }
        }
        Ok(out)
    }

    // --- array access ---

    /// Borrow an array's block; valid until the next page transition
    pub fn array(&mut self, name: &str) -> Result<&ArrayData> {
        self.ensure_page()?;
        let at = self.array_slot(name)?;
        if self.page.array_value(at).is_none() {
            return Err(self
                .errors
                .record(SdfError::usage(format!("array {name:?} has no data on this page"))));
        }
        Ok(self.page.array_value(at).unwrap())
    }

    /// Array converted to doubles along with its dimension sizes
    pub fn array_as_f64(&mut self, name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
        let (dims, declared, values) = {
            let block = self.array(name)?;
            let values: Vec<Value> = (0..block.data.len())
                .map(|i| block.data.get(i).unwrap())
                .collect();
            (block.dims.clone(), block.data.scalar_type(), values)
        };
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            match v.as_f64() {
                Some(x) => out.push(x),
                None => {
                    return Err(self.errors.record(SdfError::TypeMismatch {
                        kind: EntityKind::Array,
                        name: name.to_string(),
                        declared,
                        requested: ScalarType::F64,
                    }))
                }
            }
        }
        Ok((dims, out))
    }

    // --- row and column flags ---

    pub fn set_row_flags(&mut self, state: bool) {
        self.page.set_row_flags(state);
    }

    pub fn set_row_flag(&mut self, row: usize, state: bool) -> Result<()> {
        self.page.set_row_flag(row, state).map_err(|e| self.errors.record(e))
    }

    pub fn assert_row_flags(&mut self, flags: &[bool]) {
        self.page.assert_row_flags(flags);
    }

    /// Clear flags on rows outside (or, inverted, inside) the window
    pub fn filter_rows_by_window(
        &mut self,
        column: &str,
        lower: f64,
        upper: f64,
        invert: bool,
    ) -> Result<usize> {
        let at = self.column_slot(column)?;
        self.page
            .filter_rows_by_window(at, lower, upper, invert)
            .map_err(|e| self.errors.record(e))
    }

    pub fn set_column_flags(&mut self, state: bool) {
        self.page.set_column_flags(state);
    }

    pub fn set_column_flag(&mut self, name: &str, state: bool) -> Result<()> {
        let at = self.column_slot(name)?;
        self.page.set_column_flag(at, state).map_err(|e| self.errors.record(e))
    }

    pub fn column_of_interest(&self, name: &str) -> bool {
        self.layout
            .column_index(name)
            .and_then(|at| self.page.column_flag(at))
            .unwrap_or(false)
    }

    /// Physically drop the rows whose flag is cleared
    pub fn delete_unset_rows(&mut self) {
        self.page.delete_unset_rows();
    }

    // --- existence checks ---

    /// Check a column's presence, units, and type class
    pub fn check_column(
        &self,
        name: &str,
        units: Option<&str>,
        class: TypeClass,
    ) -> CheckResult {
        match self.layout.column(name) {
            None => CheckResult::NonExistent,
            Some(def) => {
                if !class.matches(def.data_type) {
                    CheckResult::WrongType
                } else if let Some(want) = units {
                    if def.units.as_deref() == Some(want) {
                        CheckResult::Okay
                    } else {
                        CheckResult::WrongUnits
                    }
                } else {
                    CheckResult::Okay
                }
            }
        }
    }

    /// Check a parameter's presence, units, and type class
    pub fn check_parameter(
        &self,
        name: &str,
        units: Option<&str>,
        class: TypeClass,
    ) -> CheckResult {
        match self.layout.parameter(name) {
            None => CheckResult::NonExistent,
            Some(def) => {
                if !class.matches(def.data_type) {
                    CheckResult::WrongType
                } else if let Some(want) = units {
                    if def.units.as_deref() == Some(want) {
                        CheckResult::Okay
                    } else {
                        CheckResult::WrongUnits
                    }
                } else {
                    CheckResult::Okay
                }
            }
        }
    }
}

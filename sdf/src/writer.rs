//! Output stream controller and accessor surface
//!
//! A writer owns its byte sink, a layout that stays mutable until the
//! first page is emitted, and the buffer for the page being assembled.
//! `write_page` is atomic at page granularity: the page is encoded in
//! memory and appended with a single write, so a failure leaves the sink
//! at its previous page boundary.

use crate::diagnostics::ErrorQueue;
use crate::reader::SdfReader;
use crate::source::ByteSink;
use sdf_core::codec::{ascii, binary, WriteOptions};
use sdf_core::header;
use sdf_core::layout::{
    ArrayDef, AssociateDef, ColumnDef, EntityKind, LikeColumn, ParameterDef,
};
use sdf_core::page::{ArrayData, ColumnData};
use sdf_core::{
    DataMode, FileMode, Layout, PageBuffer, Result, ScalarType, SdfConfig, SdfError, Value,
};
use std::path::Path;

/// Sequential writer over one SDF output
pub struct SdfWriter {
    layout: Layout,
    page: PageBuffer,
    sink: Option<ByteSink>,
    config: SdfConfig,
    errors: ErrorQueue,
    layout_written: bool,
    page_started: bool,
    pages_written: u32,
    restore_suppressed_columns: bool,
}

impl SdfWriter {
    /// Create a file output with an empty layout
    pub fn create(
        path: impl AsRef<Path>,
        mode: DataMode,
        description: Option<&str>,
        contents: Option<&str>,
    ) -> Result<Self> {
        Self::from_sink(ByteSink::create(path)?, mode, description, contents)
    }

    /// Write to standard output
    pub fn to_stdout(
        mode: DataMode,
        description: Option<&str>,
        contents: Option<&str>,
    ) -> Result<Self> {
        Self::from_sink(ByteSink::stdout(), mode, description, contents)
    }

    /// Wrap any byte sink with an empty layout
    pub fn from_sink(
        sink: ByteSink,
        mode: DataMode,
        description: Option<&str>,
        contents: Option<&str>,
    ) -> Result<Self> {
        let config = sdf_core::default_config();
        let mut layout = Layout::with_validity(config.name_validity);
        layout.data_mode = mode;
        layout.description = description.map(str::to_string);
        layout.contents = contents.map(str::to_string);
        let page = PageBuffer::new(&layout);
        Ok(SdfWriter {
            layout,
            page,
            sink: Some(sink),
            config,
            errors: ErrorQueue::new(),
            layout_written: false,
            page_started: false,
            pages_written: 0,
            restore_suppressed_columns: false,
        })
    }

    /// Create a writer whose layout equals the reader's
    ///
    /// Description, contents, data mode, and every entity definition are
    /// copied; the writer remains mutable until its first page goes out.
    pub fn initialize_copy(source: &SdfReader, sink: ByteSink) -> Result<Self> {
        let mut writer = Self::from_sink(sink, source.layout().data_mode, None, None)?;
        writer.layout = source.layout().clone();
        writer.page = PageBuffer::new(&writer.layout);
        Ok(writer)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn current_page(&self) -> &PageBuffer {
        &self.page
    }

    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    pub fn count_rows_of_interest(&self) -> usize {
        self.page.count_rows_of_interest()
    }

    /// Emit type-default values for suppressed columns instead of leaving
    /// them off the page entirely
    pub fn set_restore_suppressed_columns(&mut self, restore: bool) {
        self.restore_suppressed_columns = restore;
    }

    /// Change the data mode before the header goes out
    pub fn set_data_mode(&mut self, mode: DataMode) -> Result<()> {
        self.ensure_mutable()?;
        self.layout.data_mode = mode;
        Ok(())
    }

    /// Change the description before the header goes out
    pub fn set_description(
        &mut self,
        description: Option<&str>,
        contents: Option<&str>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        self.layout.description = description.map(str::to_string);
        self.layout.contents = contents.map(str::to_string);
        Ok(())
    }

    // --- diagnostics ---

    pub fn diagnostics(&mut self) -> &mut ErrorQueue {
        &mut self.errors
    }

    pub fn n_errors(&self) -> usize {
        self.errors.len()
    }

    // --- layout definition ---

    fn ensure_mutable(&mut self) -> Result<()> {
        if self.layout_written {
            return Err(self.errors.record(SdfError::usage(
                "the layout is frozen once the first page has been written",
            )));
        }
        Ok(())
    }

    pub fn define_parameter(&mut self, def: ParameterDef) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self.layout.define_parameter(def).map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(at)
    }

    /// Shorthand for a parameter with only name, units, and type
    pub fn define_simple_parameter(
        &mut self,
        name: &str,
        units: Option<&str>,
        ty: ScalarType,
    ) -> Result<usize> {
        let mut def = ParameterDef::new(name, ty);
        def.units = units.map(str::to_string);
        self.define_parameter(def)
    }

    pub fn define_column(&mut self, def: ColumnDef) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self.layout.define_column(def).map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(at)
    }

    /// Shorthand for a column with only name, units, and type
    pub fn define_simple_column(
        &mut self,
        name: &str,
        units: Option<&str>,
        ty: ScalarType,
    ) -> Result<usize> {
        let mut def = ColumnDef::new(name, ty);
        def.units = units.map(str::to_string);
        self.define_column(def)
    }

    pub fn define_array(&mut self, def: ArrayDef) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self.layout.define_array(def).map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(at)
    }

    pub fn define_associate(&mut self, def: AssociateDef) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self
            .layout
            .define_associate(def)
            .map_err(|e| self.errors.record(e))?;
        Ok(at)
    }

    pub fn delete_parameter(&mut self, name: &str) -> Result<()> {
        self.ensure_mutable()?;
        self.layout.delete_parameter(name).map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(())
    }

    pub fn delete_column(&mut self, name: &str) -> Result<()> {
        self.ensure_mutable()?;
        self.layout.delete_column(name).map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(())
    }

    // --- definition transfer ---

    /// Copy one parameter definition from a reader's layout
    pub fn transfer_parameter_definition(
        &mut self,
        source: &SdfReader,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self
            .layout
            .transfer_parameter_definition(source.layout(), name, new_name)
            .map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(at)
    }

    /// Copy one column definition from a reader's layout
    pub fn transfer_column_definition(
        &mut self,
        source: &SdfReader,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self
            .layout
            .transfer_column_definition(source.layout(), name, new_name)
            .map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(at)
    }

    /// Copy one array definition from a reader's layout
    pub fn transfer_array_definition(
        &mut self,
        source: &SdfReader,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        self.ensure_mutable()?;
        let at = self
            .layout
            .transfer_array_definition(source.layout(), name, new_name)
            .map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(at)
    }

    pub fn transfer_all_parameter_definitions(&mut self, source: &SdfReader) -> Result<()> {
        self.ensure_mutable()?;
        self.layout
            .transfer_all_parameter_definitions(source.layout())
            .map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(())
    }

    pub fn transfer_all_column_definitions(&mut self, source: &SdfReader) -> Result<()> {
        self.ensure_mutable()?;
        self.layout
            .transfer_all_column_definitions(source.layout())
            .map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(())
    }

    pub fn transfer_all_array_definitions(&mut self, source: &SdfReader) -> Result<()> {
        self.ensure_mutable()?;
        self.layout
            .transfer_all_array_definitions(source.layout())
            .map_err(|e| self.errors.record(e))?;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(())
    }

    /// Create a parameter from a column definition in the reader's layout
    ///
    /// If the parameter already exists its definition wins and a warning
    /// is queued, per the expansion transformation's contract.
    pub fn define_parameter_like_column(
        &mut self,
        source: &SdfReader,
        column_name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        self.ensure_mutable()?;
        let outcome = self
            .layout
            .define_parameter_like_column(source.layout(), column_name, new_name)
            .map_err(|e| self.errors.record(e))?;
        match outcome {
            LikeColumn::Defined(at) => {
                self.page.start_page(&self.layout, 0);
                self.page_started = false;
                Ok(at)
            }
            LikeColumn::AlreadyExists(at) => {
                self.errors.warn(
                    "DEFINITION_CONFLICT",
                    format!(
                        "parameter {:?} already defined; keeping the existing definition",
                        new_name.unwrap_or(column_name)
                    ),
                );
                Ok(at)
            }
        }
    }

    // --- header emission ---

    /// Write the header now, freezing the layout
    ///
    /// Called implicitly by the first `write_page`.
    pub fn write_layout(&mut self) -> Result<()> {
        if self.layout_written {
            return Ok(());
        }
        let mut bytes = Vec::new();
        header::write_layout(&mut bytes, &self.layout).map_err(|e| self.errors.record(e))?;
        let sink = self.sink.as_mut().ok_or_else(|| SdfError::usage("stream terminated"))?;
        if let Err(e) = std::io::Write::write_all(sink, &bytes) {
            return Err(self.errors.record(e.into()));
        }
        self.layout_written = true;
        Ok(())
    }

    // --- page assembly ---

    /// Prepare the page buffer with the given row capacity
    pub fn start_page(&mut self, row_capacity: usize) -> Result<()> {
        self.page.start_page(&self.layout, row_capacity);
        self.page_started = true;
        Ok(())
    }

    fn ensure_page(&mut self) -> Result<()> {
        if !self.page_started {
            return Err(self
                .errors
                .record(SdfError::usage("start_page must be called before setting values")));
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

    /// Set one parameter, converting to its declared type
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_page()?;
        let at = self.parameter_slot(name)?;
        let def = self.layout.parameter_at(at).unwrap();
        if def.fixed_value.is_some() {
            let name = def.name.clone();
            return Err(self.errors.record(SdfError::usage(format!(
                "parameter {name:?} carries a fixed value and cannot be set per page"
            ))));
        }
        let declared = def.data_type;
        let converted = value
            .into()
            .convert(declared)
            .map_err(|e| self.errors.record(e))?;
        self.page.set_parameter_value(at, converted)
    }

    /// Set several parameters at once
    pub fn set_parameters(&mut self, values: &[(&str, Value)]) -> Result<()> {
        for (name, value) in values {
            self.set_parameter(name, value.clone())?;
        }
        Ok(())
    }

    /// Set a whole column by name, converting each value
    ///
    /// The first column set on a page fixes its effective row count; later
    /// columns must supply the same number of rows, within the capacity
    /// declared by `start_page`.
    pub fn set_column<V: Into<Value> + Clone>(&mut self, name: &str, values: &[V]) -> Result<()> {
        let at = self.column_slot(name)?;
        self.set_column_at(at, values)
    }

    /// Set a whole column by index
    pub fn set_column_at<V: Into<Value> + Clone>(
        &mut self,
        index: usize,
        values: &[V],
    ) -> Result<()> {
        self.ensure_page()?;
        let declared = match self.layout.column_type(index) {
            Some(ty) => ty,
            None => {
                return Err(self
                    .errors
                    .record(SdfError::usage(format!("column index {index} out of range"))))
            }
        };
        if values.len() > self.page.capacity() {
            return Err(self.errors.record(SdfError::usage(format!(
                "{} rows exceed the page capacity of {}",
                values.len(),
                self.page.capacity()
            ))));
        }
        if self.page.n_rows() != 0 && values.len() != self.page.n_rows() {
            return Err(self.errors.record(SdfError::usage(format!(
                "column has {} rows but the page already has {}",
                values.len(),
                self.page.n_rows()
            ))));
        }
        let mut data = ColumnData::with_capacity(declared, values.len());
        for v in values {
            let converted = v
                .clone()
                .into()
                .convert(declared)
                .map_err(|e| self.errors.record(e))?;
            data.push(converted)?;
        }
        self.page.replace_column(index, data)?;
        if self.page.n_rows() == 0 {
            self.page.set_n_rows(values.len());
        }
        Ok(())
    }

    /// Set named cells of one row, extending the page's row count
    pub fn set_row_values(&mut self, row: usize, values: &[(&str, Value)]) -> Result<()> {
        self.ensure_page()?;
        if row >= self.page.capacity() {
            return Err(self.errors.record(SdfError::usage(format!(
                "row {row} exceeds the page capacity of {}",
                self.page.capacity()
            ))));
        }
        for (name, value) in values {
            let at = self.column_slot(name)?;
            let declared = self.layout.column_type(at).unwrap();
            let converted = value
                .clone()
                .convert(declared)
                .map_err(|e| self.errors.record(e))?;
            self.page.column_mut(at).unwrap().set(row, converted)?;
        }
        if row + 1 > self.page.n_rows() {
            self.page.set_n_rows(row + 1);
        }
        Ok(())
    }

    /// Set an array's dimensions and elements, converting each value
    pub fn set_array<V: Into<Value> + Clone>(
        &mut self,
        name: &str,
        dims: &[usize],
        values: &[V],
    ) -> Result<()> {
        self.ensure_page()?;
        let at = match self.layout.array_index(name) {
            Some(at) => at,
            None => {
                return Err(self.errors.record(SdfError::NameUnknown {
                    kind: EntityKind::Array,
                    name: name.to_string(),
                }))
            }
        };
        let def = self.layout.array_at(at).unwrap();
        if dims.len() != def.dimensions {
            let expected = def.dimensions;
            return Err(self.errors.record(SdfError::usage(format!(
                "array {name:?} declares {expected} dimensions, got {}",
                dims.len()
            ))));
        }
        let declared = def.data_type;
        let expected: usize = dims.iter().product();
        if values.len() != expected {
            return Err(self.errors.record(SdfError::usage(format!(
                "array {name:?} dimensions call for {expected} elements, got {}",
                values.len()
            ))));
        }
        let mut data = ColumnData::with_capacity(declared, values.len());
        for v in values {
            let converted = v
                .clone()
                .into()
                .convert(declared)
                .map_err(|e| self.errors.record(e))?;
            data.push(converted)?;
        }
        self.page.set_array_value(
            at,
            ArrayData {
                dims: dims.to_vec(),
                data,
            },
        )
    }

    // --- page maintenance ---

    /// Drop all values set so far, keeping the page's shape and capacity
    pub fn clear_page(&mut self) -> Result<()> {
        self.ensure_page()?;
        self.page.clear();
        Ok(())
    }

    /// Grow the current page's row capacity
    pub fn lengthen_page(&mut self, additional_rows: usize) -> Result<()> {
        self.ensure_page()?;
        self.page.lengthen(additional_rows);
        Ok(())
    }

    /// Clip the current page to at most the given number of rows
    pub fn shorten_page(&mut self, rows: usize) -> Result<()> {
        self.ensure_page()?;
        self.page.shorten(rows);
        Ok(())
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

    pub fn set_column_flags(&mut self, state: bool) {
        self.page.set_column_flags(state);
    }

    pub fn set_column_flag(&mut self, name: &str, state: bool) -> Result<()> {
        let at = self.column_slot(name)?;
        self.page.set_column_flag(at, state).map_err(|e| self.errors.record(e))
    }

    // --- per-page copies from a reader ---

    /// Clone the reader's current page into this writer's page buffer
    pub fn copy_page(&mut self, source: &SdfReader) -> Result<()> {
        self.start_page(source.current_page().n_rows())?;
        self.copy_parameters(source)?;
        self.copy_arrays(source)?;
        self.copy_columns(source)?;
        // carry the reader-side row selection across
        let flags: Vec<bool> = source.current_page().row_flags().to_vec();
        self.page.assert_row_flags(&flags);
        Ok(())
    }

    /// Copy every same-named parameter value from the reader's page
    pub fn copy_parameters(&mut self, source: &SdfReader) -> Result<()> {
        self.ensure_page()?;
        for (i, def) in self.layout.parameters().iter().enumerate() {
            if def.fixed_value.is_some() {
                continue;
            }
            let src_at = match source.layout().parameter_index(&def.name) {
                Some(at) => at,
                None => continue,
            };
            let value = match source.current_page().parameter_value(src_at) {
                Some(v) => v.clone(),
                None => continue,
            };
            let converted = value
                .convert(def.data_type)
                .map_err(|e| self.errors.record(e))?;
            self.page.set_parameter_value(i, converted)?;
        }
        Ok(())
    }

    /// Copy every same-named array block from the reader's page
    pub fn copy_arrays(&mut self, source: &SdfReader) -> Result<()> {
        self.ensure_page()?;
        for (i, def) in self.layout.arrays().iter().enumerate() {
            let src_at = match source.layout().array_index(&def.name) {
                Some(at) => at,
                None => continue,
            };
            let block = match source.current_page().array_value(src_at) {
                Some(b) => b.clone(),
                None => continue,
            };
            if block.data.scalar_type() != def.data_type {
                let name = def.name.clone();
                let declared = def.data_type;
                let requested = block.data.scalar_type();
                return Err(self.errors.record(SdfError::TypeMismatch {
                    kind: EntityKind::Array,
                    name,
                    declared,
                    requested,
                }));
            }
            self.page.set_array_value(i, block)?;
        }
        Ok(())
    }

    /// Copy every same-named column from the reader's page, all rows
    pub fn copy_columns(&mut self, source: &SdfReader) -> Result<()> {
        self.ensure_page()?;
        let rows = source.current_page().n_rows();
        for (i, def) in self.layout.columns().iter().enumerate() {
            let src_at = match source.layout().column_index(&def.name) {
                Some(at) => at,
                None => continue,
            };
            let src = source.current_page().column(src_at).unwrap();
            let mut data = ColumnData::with_capacity(def.data_type, rows);
            for row in 0..rows {
                let value = src
                    .get(row)
                    .unwrap_or_else(|| Value::default_for(src.scalar_type()));
                let converted = value
                    .convert(def.data_type)
                    .map_err(|e| self.errors.record(e))?;
                data.push(converted)?;
            }
            self.page.replace_column(i, data)?;
        }
        self.page.set_n_rows(rows);
        Ok(())
    }

    // --- page emission ---

    /// Emit the assembled page
    ///
    /// Parameters go out before arrays, arrays before columns; rows and
    /// columns whose interest flag is cleared are elided.
    pub fn write_page(&mut self) -> Result<()> {
        self.ensure_page()?;
        self.write_layout()?;
        let opts = WriteOptions {
            first_page: self.pages_written == 0,
            restore_suppressed_columns: self.restore_suppressed_columns,
        };
        let mut bytes = Vec::new();
        let encoded = match self.layout.data_mode.mode {
            FileMode::Binary => binary::write_page(&mut bytes, &self.layout, &self.page, &opts),
            FileMode::Ascii => ascii::write_page(&mut bytes, &self.layout, &self.page, &opts),
        };
        encoded.map_err(|e| self.errors.record(e))?;
        let sink = self.sink.as_mut().ok_or_else(|| SdfError::usage("stream terminated"))?;
        if let Err(e) = std::io::Write::write_all(sink, &bytes) {
            return Err(self.errors.record(e.into()));
        }
        self.pages_written += 1;
        self.page.start_page(&self.layout, 0);
        self.page_started = false;
        Ok(())
    }

    /// Flush, close, and (for in-place rewrites) atomically replace the
    /// original file
    ///
    /// A header-only stream is valid: if no page was written the layout is
    /// emitted before closing.
    pub fn terminate(mut self) -> Result<()> {
        if self.page_started && self.page.n_rows() > 0 {
            self.errors.warn(
                "USAGE",
                "a started page was never written and has been discarded",
            );
        }
        self.write_layout()?;
        let sink = self.sink.take().ok_or_else(|| SdfError::usage("stream terminated"))?;
        sink.finish()
    }

    /// Abandon the output, cleaning up any temporary file
    pub fn abandon(mut self) {
        if let Some(sink) = self.sink.take() {
            sink.discard();
        }
    }
}

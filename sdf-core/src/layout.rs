//! In-memory representation of a stream's header
//!
//! A [`Layout`] holds the description text, the declared parameters,
//! columns, arrays, and associates, and the data mode. Names are unique
//! within their kind; lookups go through a name index kept in declaration
//! order. A layout is mutable until the first page is emitted on an output
//! stream; the stream controller enforces the freeze.

pub mod definitions;
pub mod names;

pub use definitions::{ArrayDef, AssociateDef, ColumnDef, EntityKind, ParameterDef};
pub use names::is_valid_name;

use crate::config::NameValidity;
use crate::error::{Result, SdfError};
use crate::types::ScalarType;
use hashbrown::HashMap;

/// Textual versus binary data pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileMode {
    Ascii,
    Binary,
}

impl FileMode {
    /// Wire token used in the `&data` clause
    pub const fn name(self) -> &'static str {
        match self {
            FileMode::Ascii => "ascii",
            FileMode::Binary => "binary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ascii" => Some(FileMode::Ascii),
            "binary" => Some(FileMode::Binary),
            _ => None,
        }
    }
}

/// Contents of the `&data` clause; fixed for the life of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataMode {
    pub mode: FileMode,
    /// Physical lines per table row in textual mode
    pub lines_per_row: usize,
    /// Omit row counts; a blank line (textual) or per-row flag (binary)
    /// delimits the page instead
    pub no_row_counts: bool,
    /// Foreign header lines consumed before the first page
    pub additional_header_lines: usize,
    /// Emit the column table one column at a time instead of one row at a
    /// time
    pub column_major: bool,
}

impl DataMode {
    /// The default when the header carries no `&data` clause
    pub const fn ascii() -> Self {
        DataMode {
            mode: FileMode::Ascii,
            lines_per_row: 1,
            no_row_counts: false,
            additional_header_lines: 0,
            column_major: false,
        }
    }

    pub const fn binary() -> Self {
        DataMode {
            mode: FileMode::Binary,
            ..Self::ascii()
        }
    }
}

impl Default for DataMode {
    fn default() -> Self {
        Self::ascii()
    }
}

/// Outcome of [`Layout::define_parameter_like_column`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeColumn {
    /// A new parameter was created at this index
    Defined(usize),
    /// A parameter of that name already existed; its definition wins and
    /// the caller should surface a warning
    AlreadyExists(usize),
}

trait Named {
    fn entity_name(&self) -> &str;
    fn kind() -> EntityKind;
}

impl Named for ParameterDef {
    fn entity_name(&self) -> &str {
        &self.name
    }
    fn kind() -> EntityKind {
        EntityKind::Parameter
    }
}
impl Named for ColumnDef {
    fn entity_name(&self) -> &str {
        &self.name
    }
    fn kind() -> EntityKind {
        EntityKind::Column
    }
}
impl Named for ArrayDef {
    fn entity_name(&self) -> &str {
        &self.name
    }
    fn kind() -> EntityKind {
        EntityKind::Array
    }
}
impl Named for AssociateDef {
    fn entity_name(&self) -> &str {
        &self.name
    }
    fn kind() -> EntityKind {
        EntityKind::Associate
    }
}

/// Declaration-ordered list with a name index
#[derive(Debug, Clone, Default)]
struct Registry<T: Named> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Named> Registry<T> {
    fn new() -> Self {
        Registry {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, item: T, validity: NameValidity) -> Result<usize> {
        let name = item.entity_name();
        if !is_valid_name(name, validity) {
            return Err(SdfError::InvalidName {
                kind: T::kind(),
                name: name.to_string(),
            });
        }
        if self.index.contains_key(name) {
            return Err(SdfError::DefinitionConflict {
                kind: T::kind(),
                name: name.to_string(),
            });
        }
        let at = self.items.len();
        self.index.insert(name.to_string(), at);
        self.items.push(item);
        Ok(at)
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.lookup(name).map(|i| &self.items[i])
    }

    fn remove(&mut self, name: &str) -> Result<T> {
        let at = self.lookup(name).ok_or_else(|| SdfError::NameUnknown {
            kind: T::kind(),
            name: name.to_string(),
        })?;
        let item = self.items.remove(at);
        self.index.clear();
        for (i, it) in self.items.iter().enumerate() {
            self.index.insert(it.entity_name().to_string(), i);
        }
        Ok(item)
    }
}

/// The ordered tuple of everything a header declares
#[derive(Debug, Clone)]
pub struct Layout {
    /// Free description text from the `&description` clause
    pub description: Option<String>,
    /// Machine-oriented contents tag from the `&description` clause
    pub contents: Option<String>,
    /// Protocol version digit written after the magic
    pub version: u8,
    /// Data mode recorded from the `&data` clause
    pub data_mode: DataMode,
    parameters: Registry<ParameterDef>,
    columns: Registry<ColumnDef>,
    arrays: Registry<ArrayDef>,
    associates: Registry<AssociateDef>,
    name_validity: NameValidity,
}

impl Layout {
    /// Version digit emitted by writers
    pub const WRITE_VERSION: u8 = 1;

    /// Highest version digit readers accept
    pub const MAX_READ_VERSION: u8 = 5;

    pub fn new() -> Self {
        Self::with_validity(crate::config::default_config().name_validity)
    }

    pub fn with_validity(name_validity: NameValidity) -> Self {
        Layout {
            description: None,
            contents: None,
            version: Self::WRITE_VERSION,
            data_mode: DataMode::default(),
            parameters: Registry::new(),
            columns: Registry::new(),
            arrays: Registry::new(),
            associates: Registry::new(),
            name_validity,
        }
    }

    /// The validity rules this layout applies at definition time
    pub fn name_validity(&self) -> NameValidity {
        self.name_validity
    }

    /// Change the rules applied to future definitions
    ///
    /// Names already in the layout are kept as-is; header parsing uses this
    /// after accepting a producer's names verbatim.
    pub fn set_name_validity(&mut self, validity: NameValidity) {
        self.name_validity = validity;
    }

    // --- parameters ---

    pub fn define_parameter(&mut self, def: ParameterDef) -> Result<usize> {
        self.parameters.insert(def, self.name_validity)
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.lookup(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.get(name)
    }

    pub fn parameter_at(&self, index: usize) -> Option<&ParameterDef> {
        self.parameters.items.get(index)
    }

    /// Mutable access for attribute changes before the layout is frozen
    ///
    /// The name itself must not be changed through this reference; delete
    /// and redefine instead.
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut ParameterDef> {
        let at = self.parameters.lookup(name)?;
        Some(&mut self.parameters.items[at])
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters.items
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.items.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn n_parameters(&self) -> usize {
        self.parameters.items.len()
    }

    pub fn delete_parameter(&mut self, name: &str) -> Result<ParameterDef> {
        self.parameters.remove(name)
    }

    // --- columns ---

    pub fn define_column(&mut self, def: ColumnDef) -> Result<usize> {
        self.columns.insert(def, self.name_validity)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.lookup(name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    pub fn column_at(&self, index: usize) -> Option<&ColumnDef> {
        self.columns.items.get(index)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDef> {
        let at = self.columns.lookup(name)?;
        Some(&mut self.columns.items[at])
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns.items
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.items.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.items.len()
    }

    pub fn delete_column(&mut self, name: &str) -> Result<ColumnDef> {
        self.columns.remove(name)
    }

    // --- arrays ---

    pub fn define_array(&mut self, def: ArrayDef) -> Result<usize> {
        if def.dimensions == 0 {
            return Err(SdfError::usage(format!(
                "array {:?} must have at least one dimension",
                def.name
            )));
        }
        self.arrays.insert(def, self.name_validity)
    }

    pub fn array_index(&self, name: &str) -> Option<usize> {
        self.arrays.lookup(name)
    }

    pub fn array(&self, name: &str) -> Option<&ArrayDef> {
        self.arrays.get(name)
    }

    pub fn array_at(&self, index: usize) -> Option<&ArrayDef> {
        self.arrays.items.get(index)
    }

    pub fn arrays(&self) -> &[ArrayDef] {
        &self.arrays.items
    }

    pub fn array_names(&self) -> Vec<&str> {
        self.arrays.items.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn n_arrays(&self) -> usize {
        self.arrays.items.len()
    }

    pub fn delete_array(&mut self, name: &str) -> Result<ArrayDef> {
        self.arrays.remove(name)
    }

    // --- associates ---

    pub fn define_associate(&mut self, def: AssociateDef) -> Result<usize> {
        self.associates.insert(def, self.name_validity)
    }

    pub fn associate(&self, name: &str) -> Option<&AssociateDef> {
        self.associates.get(name)
    }

    pub fn associates(&self) -> &[AssociateDef] {
        &self.associates.items
    }

    pub fn associate_names(&self) -> Vec<&str> {
        self.associates.items.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn n_associates(&self) -> usize {
        self.associates.items.len()
    }

    pub fn delete_associate(&mut self, name: &str) -> Result<AssociateDef> {
        self.associates.remove(name)
    }

    // --- transfers ---

    /// Copy one parameter definition from another layout, optionally under
    /// a new name
    ///
    /// Succeeds silently when the destination already has a same-named
    /// parameter of the same type; fails with `DEFINITION_CONFLICT` when the
    /// types differ.
    pub fn transfer_parameter_definition(
        &mut self,
        source: &Layout,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        let def = source.parameter(name).ok_or_else(|| SdfError::NameUnknown {
            kind: EntityKind::Parameter,
            name: name.to_string(),
        })?;
        let target = new_name.unwrap_or(name);
        if let Some(existing) = self.parameter(target) {
            if existing.data_type == def.data_type {
                return Ok(self.parameter_index(target).unwrap());
            }
            return Err(SdfError::DefinitionConflict {
                kind: EntityKind::Parameter,
                name: target.to_string(),
            });
        }
        let mut copy = def.clone();
        copy.name = target.to_string();
        self.define_parameter(copy)
    }

    /// Copy one column definition from another layout, optionally renamed
    pub fn transfer_column_definition(
        &mut self,
        source: &Layout,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        let def = source.column(name).ok_or_else(|| SdfError::NameUnknown {
            kind: EntityKind::Column,
            name: name.to_string(),
        })?;
        let target = new_name.unwrap_or(name);
        if let Some(existing) = self.column(target) {
            if existing.data_type == def.data_type {
                return Ok(self.column_index(target).unwrap());
            }
            return Err(SdfError::DefinitionConflict {
                kind: EntityKind::Column,
                name: target.to_string(),
            });
        }
        let mut copy = def.clone();
        copy.name = target.to_string();
        self.define_column(copy)
    }

    /// Copy one array definition from another layout, optionally renamed
    pub fn transfer_array_definition(
        &mut self,
        source: &Layout,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<usize> {
        let def = source.array(name).ok_or_else(|| SdfError::NameUnknown {
            kind: EntityKind::Array,
            name: name.to_string(),
        })?;
        let target = new_name.unwrap_or(name);
        if let Some(existing) = self.array(target) {
            if existing.data_type == def.data_type && existing.dimensions == def.dimensions {
                return Ok(self.array_index(target).unwrap());
            }
            return Err(SdfError::DefinitionConflict {
                kind: EntityKind::Array,
                name: target.to_string(),
            });
        }
        let mut copy = def.clone();
        copy.name = target.to_string();
        self.define_array(copy)
    }

    pub fn transfer_all_parameter_definitions(&mut self, source: &Layout) -> Result<()> {
        for def in source.parameters() {
            self.transfer_parameter_definition(source, &def.name, None)?;
        }
        Ok(())
    }

    pub fn transfer_all_column_definitions(&mut self, source: &Layout) -> Result<()> {
        for def in source.columns() {
            self.transfer_column_definition(source, &def.name, None)?;
        }
        Ok(())
    }

    pub fn transfer_all_array_definitions(&mut self, source: &Layout) -> Result<()> {
        for def in source.arrays() {
            self.transfer_array_definition(source, &def.name, None)?;
        }
        Ok(())
    }

    /// Create a parameter whose metadata is drawn from a column of the
    /// source layout
    ///
    /// Used by the columns→parameters expansion. A pre-existing parameter
    /// of the target name wins; the caller is told so it can warn.
    pub fn define_parameter_like_column(
        &mut self,
        source: &Layout,
        column_name: &str,
        new_name: Option<&str>,
    ) -> Result<LikeColumn> {
        let col = source.column(column_name).ok_or_else(|| SdfError::NameUnknown {
            kind: EntityKind::Column,
            name: column_name.to_string(),
        })?;
        let target = new_name.unwrap_or(column_name);
        if let Some(at) = self.parameter_index(target) {
            return Ok(LikeColumn::AlreadyExists(at));
        }
        let def = ParameterDef {
            name: target.to_string(),
            symbol: col.symbol.clone(),
            units: col.units.clone(),
            description: col.description.clone(),
            format_string: col.format_string.clone(),
            data_type: col.data_type,
            fixed_value: None,
        };
        Ok(LikeColumn::Defined(self.define_parameter(def)?))
    }

    /// Scalar type of a column by index, used by the codecs
    pub fn column_type(&self, index: usize) -> Option<ScalarType> {
        self.column_at(index).map(|c| c.data_type)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Layout {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
            && self.contents == other.contents
            && self.version == other.version
            && self.data_mode == other.data_mode
            && self.parameters.items == other.parameters.items
            && self.columns.items == other.columns.items
            && self.arrays.items == other.arrays.items
            && self.associates.items == other.associates.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with_xy() -> Layout {
        let mut l = Layout::with_validity(NameValidity::Strict);
        l.define_column(ColumnDef::new("x", ScalarType::F64).with_units("m"))
            .unwrap();
        l.define_column(ColumnDef::new("y", ScalarType::F64)).unwrap();
        l
    }

    #[test]
    fn test_declaration_order_and_lookup() {
        let l = layout_with_xy();
        assert_eq!(l.column_names(), vec!["x", "y"]);
        assert_eq!(l.column_index("y"), Some(1));
        assert_eq!(l.column_index("z"), None);
    }

    #[test]
    fn test_duplicate_definition_conflicts() {
        let mut l = layout_with_xy();
        let err = l.define_column(ColumnDef::new("x", ScalarType::I32)).unwrap_err();
        assert!(matches!(err, SdfError::DefinitionConflict { .. }));
    }

    #[test]
    fn test_strict_names_rejected_at_definition() {
        let mut l = Layout::with_validity(NameValidity::Strict);
        let err = l
            .define_parameter(ParameterDef::new("bad name", ScalarType::F64))
            .unwrap_err();
        assert!(matches!(err, SdfError::InvalidName { .. }));

        let mut relaxed = Layout::with_validity(NameValidity::Any);
        relaxed
            .define_parameter(ParameterDef::new("bad name", ScalarType::F64))
            .unwrap();
    }

    #[test]
    fn test_transfer_definition() {
        let src = layout_with_xy();
        let mut dst = Layout::with_validity(NameValidity::Strict);
        dst.transfer_column_definition(&src, "x", Some("xFiltered")).unwrap();
        let col = dst.column("xFiltered").unwrap();
        assert_eq!(col.data_type, ScalarType::F64);
        assert_eq!(col.units.as_deref(), Some("m"));

        // same target with a different type conflicts
        let mut src2 = Layout::with_validity(NameValidity::Strict);
        src2.define_column(ColumnDef::new("xFiltered", ScalarType::I32)).unwrap();
        let err = dst
            .transfer_column_definition(&src2, "xFiltered", None)
            .unwrap_err();
        assert!(matches!(err, SdfError::DefinitionConflict { .. }));

        // matching type is a silent no-op
        dst.transfer_column_definition(&src, "x", Some("xFiltered")).unwrap();
        assert_eq!(dst.n_columns(), 1);
    }

    #[test]
    fn test_define_parameter_like_column() {
        let src = layout_with_xy();
        let mut dst = Layout::with_validity(NameValidity::Strict);
        assert_eq!(
            dst.define_parameter_like_column(&src, "x", None).unwrap(),
            LikeColumn::Defined(0)
        );
        assert_eq!(dst.parameter("x").unwrap().units.as_deref(), Some("m"));
        // second time the existing definition wins
        assert_eq!(
            dst.define_parameter_like_column(&src, "x", None).unwrap(),
            LikeColumn::AlreadyExists(0)
        );
    }

    #[test]
    fn test_delete_rebuilds_index() {
        let mut l = layout_with_xy();
        l.delete_column("x").unwrap();
        assert_eq!(l.column_index("y"), Some(0));
        assert!(l.delete_column("x").is_err());
    }
}

//! Definition records for the four entity kinds
//!
//! Each record carries the metadata emitted in its header clause. Fields
//! that are optional on the wire are `Option` here; absent means the key is
//! not written.

use crate::types::ScalarType;

/// The kind of a named entity, used for lookup scoping and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Parameter,
    Column,
    Array,
    Associate,
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            EntityKind::Parameter => "parameter",
            EntityKind::Column => "column",
            EntityKind::Array => "array",
            EntityKind::Associate => "associate",
        };
        f.write_str(s)
    }
}

/// Scalar that carries one value per page
///
/// A parameter with a `fixed_value` has that literal on every page and is
/// not written into per-page data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterDef {
    pub name: String,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    pub data_type: ScalarType,
    pub fixed_value: Option<String>,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, data_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            data_type,
            fixed_value: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_fixed_value(mut self, value: impl Into<String>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }
}

/// Vector of scalars aligned by row index within a page
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnDef {
    pub name: String,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    pub data_type: ScalarType,
    /// Field width hint honored only by the textual codec
    pub field_length: Option<usize>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            data_type,
            field_length: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// N-dimensional block of scalars; sizes along each dimension are per-page
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayDef {
    pub name: String,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    pub group_name: Option<String>,
    pub data_type: ScalarType,
    pub field_length: Option<usize>,
    /// Number of dimensions, fixed by the layout
    pub dimensions: usize,
}

impl ArrayDef {
    pub fn new(name: impl Into<String>, data_type: ScalarType, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            group_name: None,
            data_type,
            field_length: None,
            dimensions,
        }
    }
}

/// Pure metadata pointing at a sibling file; no data is read through it
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssociateDef {
    pub name: String,
    pub filename: String,
    pub path: Option<String>,
    pub description: Option<String>,
    pub contents: Option<String>,
    /// Whether the referenced file is itself in SDF form
    pub sdds: bool,
}

impl AssociateDef {
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            path: None,
            description: None,
            contents: None,
            sdds: false,
        }
    }
}

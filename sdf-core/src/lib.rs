//! SDF Core - Self-Describing Data Format Definitions and Codecs
//!
//! This crate provides the format layer shared by every SDF stream: the
//! closed scalar type set, the layout model, the textual header codec, the
//! page buffer, and the binary/textual page codecs. Endpoint management
//! (files, pipes, temp-file rewrite) and the accessor surface live in the
//! `sdf` crate.

pub mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod layout;
pub mod page;
pub mod types;

pub use codec::{PageOutcome, PageStatus, ReadOptions, WriteOptions};
pub use config::{
    default_config, set_default_auto_recover, set_default_name_validity, set_default_row_limit,
    NameValidity, SdfConfig,
};
pub use error::{Result, SdfError};
pub use layout::{
    ArrayDef, AssociateDef, ColumnDef, DataMode, EntityKind, FileMode, Layout, LikeColumn,
    ParameterDef,
};
pub use page::{ArrayData, ColumnData, PageBuffer};
pub use types::{ScalarType, Value};

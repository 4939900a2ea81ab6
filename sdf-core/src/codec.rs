//! Page data codecs
//!
//! Two wire modes with identical semantic content: little-endian binary and
//! free-format text. Both codecs fill or drain a [`PageBuffer`] against a
//! [`Layout`]; endpoint management and page sequencing live above, in the
//! stream controller.

pub mod ascii;
pub mod binary;
pub mod text;

/// Outcome of decoding one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// A complete page was materialized
    Read,
    /// The page ended mid-row; the fully-read prefix is in the buffer
    Truncated,
    /// Clean end of the stream before any page content
    EndOfStream,
}

/// Decoding result plus soft diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStatus {
    pub outcome: PageOutcome,
    /// The page claimed more rows than the configured limit allowed
    pub row_limit_hit: bool,
}

impl PageStatus {
    pub fn read() -> Self {
        PageStatus {
            outcome: PageOutcome::Read,
            row_limit_hit: false,
        }
    }

    pub fn end_of_stream() -> Self {
        PageStatus {
            outcome: PageOutcome::EndOfStream,
            row_limit_hit: false,
        }
    }
}

/// Row-selection knobs applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Soft cap on rows materialized per page
    pub row_limit: Option<u64>,
    /// Keep every `sparse_interval`-th row
    pub sparse_interval: usize,
    /// First row index kept by the sparse selection
    pub sparse_offset: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            row_limit: None,
            sparse_interval: 1,
            sparse_offset: 0,
        }
    }
}

impl ReadOptions {
    /// Whether the sparse selection admits this 0-based row index
    pub fn admits(&self, row: usize) -> bool {
        row >= self.sparse_offset && (row - self.sparse_offset) % self.sparse_interval.max(1) == 0
    }
}

/// Page emission knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// First page of the stream (drives `additional_header_lines`)
    pub first_page: bool,
    /// Emit type-default values for columns whose interest flag is cleared
    /// instead of suppressing them from the page
    pub restore_suppressed_columns: bool,
}

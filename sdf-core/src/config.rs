//! Process-wide knobs and the per-stream configuration record
//!
//! Streams capture an [`SdfConfig`] when they are opened. The process-wide
//! default exists for CLI wrappers; mutating it never affects streams that
//! are already open.

use parking_lot::RwLock;

/// Name-validity rules applied at definition time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameValidity {
    /// Names must match `[A-Za-z_][A-Za-z0-9_.$:]*`
    Strict,
    /// Any non-empty name without control characters
    Any,
}

/// Per-stream configuration captured at open time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdfConfig {
    /// Soft cap on rows per page; pages claiming more are clipped
    pub row_limit: Option<u64>,
    /// Name grammar enforced when entities are defined
    pub name_validity: NameValidity,
    /// Hand truncated pages to the caller instead of returning the soft zero
    pub auto_recover: bool,
}

impl SdfConfig {
    /// Built-in defaults: no row limit, strict names, no auto recovery
    pub const DEFAULT: SdfConfig = SdfConfig {
        row_limit: None,
        name_validity: NameValidity::Strict,
        auto_recover: false,
    };
}

impl Default for SdfConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static PROCESS_DEFAULTS: RwLock<SdfConfig> = RwLock::new(SdfConfig::DEFAULT);

/// Snapshot of the process-wide defaults used by subsequent opens
pub fn default_config() -> SdfConfig {
    *PROCESS_DEFAULTS.read()
}

/// Set the process-wide row limit default
///
/// Returns the previous value, as callers commonly save and restore it.
pub fn set_default_row_limit(limit: Option<u64>) -> Option<u64> {
    let mut cfg = PROCESS_DEFAULTS.write();
    core::mem::replace(&mut cfg.row_limit, limit)
}

/// Set the process-wide name validity default
pub fn set_default_name_validity(validity: NameValidity) {
    PROCESS_DEFAULTS.write().name_validity = validity;
}

/// Set the process-wide read-recovery default
pub fn set_default_auto_recover(auto: bool) {
    PROCESS_DEFAULTS.write().auto_recover = auto;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SdfConfig::default();
        assert_eq!(cfg.row_limit, None);
        assert_eq!(cfg.name_validity, NameValidity::Strict);
        assert!(!cfg.auto_recover);
    }
}

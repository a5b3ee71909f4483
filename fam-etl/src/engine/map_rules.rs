//! MAP phase value transforms: vocabulary translation and lookups
//!
//! FIELD_MAPPING is structural (header renaming) and handled by the MAP
//! phase itself; these functions cover the value-level MAP kinds.

use crate::models::rule::{EnumMappingConfig, ReferenceLookupConfig};

/// Translate a value through the configured vocabulary
///
/// Case-insensitive configs carry pre-lowercased keys (folded at parse
/// time), so both paths are a single map lookup. Unmatched values fall back
/// to the configured default, or pass through unchanged when no default is
/// set.
pub fn enum_map(cfg: &EnumMappingConfig, value: &str) -> String {
    let found = if cfg.case_insensitive {
        cfg.mapping.get(value.to_lowercase().as_str())
    } else {
        cfg.mapping.get(value)
    };
    match found {
        Some(to) => to.clone(),
        None => cfg.default.clone().unwrap_or_else(|| value.to_string()),
    }
}

/// Replace a value with its reference-table entry
///
/// A miss uses the default when present; otherwise the original value is
/// kept and reported as a row-scoped error so data quality is visible.
pub fn reference_lookup(cfg: &ReferenceLookupConfig, value: &str) -> Result<String, String> {
    if let Some(found) = cfg.table.get(value) {
        return Ok(found.clone());
    }
    match &cfg.default {
        Some(default) => Ok(default.clone()),
        None => Err(format!("'{}' not found in reference table", value)),
    }
}

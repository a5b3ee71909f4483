//! Transformation rule definitions
//!
//! A rule belongs to exactly one pipeline phase, carries a kind drawn from
//! that phase's closed type-set, and a JSON config block that deserializes
//! into the kind's parameter struct. Kind/phase consistency and config shape
//! are both checked at save time so the engine never probes untyped JSON
//! mid-run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Pipeline phase, executed in fixed order per job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Header/row normalization, delimiter handling
    Extract,
    /// Structural checks on the normalized row set
    Validate,
    /// Text cleaning (trim, replace, de-duplicate)
    Clean,
    /// Value shaping (case, date, numeric, derived fields)
    Transform,
    /// Column-to-asset-field resolution and vocabulary mapping
    Map,
    /// Asset upsert, the only phase with external side effects
    Load,
}

impl Phase {
    /// Fixed execution order
    pub const SEQUENCE: [Phase; 6] = [
        Phase::Extract,
        Phase::Validate,
        Phase::Clean,
        Phase::Transform,
        Phase::Map,
        Phase::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Extract => "EXTRACT",
            Phase::Validate => "VALIDATE",
            Phase::Clean => "CLEAN",
            Phase::Transform => "TRANSFORM",
            Phase::Map => "MAP",
            Phase::Load => "LOAD",
        }
    }

    pub fn parse(s: &str) -> Option<Phase> {
        Phase::SEQUENCE.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule kind, scoped to a single phase
///
/// Closed enum so adding a kind forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    // VALIDATE
    RequiredColumns,
    NonEmpty,
    // CLEAN
    Trim,
    RegexReplace,
    ExactReplace,
    RemoveDuplicates,
    // TRANSFORM
    CaseConvert,
    DateFormat,
    NumberFormat,
    CalculateField,
    // MAP
    FieldMapping,
    EnumMapping,
    ReferenceLookup,
    DefaultValue,
    // LOAD (policy-carrying, consumed by the load phase)
    ConflictResolution,
    BatchSize,
    TransactionBoundary,
    RollbackStrategy,
}

impl RuleKind {
    /// The phase this kind belongs to
    pub fn phase(self) -> Phase {
        match self {
            RuleKind::RequiredColumns | RuleKind::NonEmpty => Phase::Validate,
            RuleKind::Trim
            | RuleKind::RegexReplace
            | RuleKind::ExactReplace
            | RuleKind::RemoveDuplicates => Phase::Clean,
            RuleKind::CaseConvert
            | RuleKind::DateFormat
            | RuleKind::NumberFormat
            | RuleKind::CalculateField => Phase::Transform,
            RuleKind::FieldMapping
            | RuleKind::EnumMapping
            | RuleKind::ReferenceLookup
            | RuleKind::DefaultValue => Phase::Map,
            RuleKind::ConflictResolution
            | RuleKind::BatchSize
            | RuleKind::TransactionBoundary
            | RuleKind::RollbackStrategy => Phase::Load,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::RequiredColumns => "REQUIRED_COLUMNS",
            RuleKind::NonEmpty => "NON_EMPTY",
            RuleKind::Trim => "TRIM",
            RuleKind::RegexReplace => "REGEX_REPLACE",
            RuleKind::ExactReplace => "EXACT_REPLACE",
            RuleKind::RemoveDuplicates => "REMOVE_DUPLICATES",
            RuleKind::CaseConvert => "CASE_CONVERT",
            RuleKind::DateFormat => "DATE_FORMAT",
            RuleKind::NumberFormat => "NUMBER_FORMAT",
            RuleKind::CalculateField => "CALCULATE_FIELD",
            RuleKind::FieldMapping => "FIELD_MAPPING",
            RuleKind::EnumMapping => "ENUM_MAPPING",
            RuleKind::ReferenceLookup => "REFERENCE_LOOKUP",
            RuleKind::DefaultValue => "DEFAULT_VALUE",
            RuleKind::ConflictResolution => "CONFLICT_RESOLUTION",
            RuleKind::BatchSize => "BATCH_SIZE",
            RuleKind::TransactionBoundary => "TRANSACTION_BOUNDARY",
            RuleKind::RollbackStrategy => "ROLLBACK_STRATEGY",
        }
    }

    pub fn parse(s: &str) -> Option<RuleKind> {
        const ALL: [RuleKind; 18] = [
            RuleKind::RequiredColumns,
            RuleKind::NonEmpty,
            RuleKind::Trim,
            RuleKind::RegexReplace,
            RuleKind::ExactReplace,
            RuleKind::RemoveDuplicates,
            RuleKind::CaseConvert,
            RuleKind::DateFormat,
            RuleKind::NumberFormat,
            RuleKind::CalculateField,
            RuleKind::FieldMapping,
            RuleKind::EnumMapping,
            RuleKind::ReferenceLookup,
            RuleKind::DefaultValue,
            RuleKind::ConflictResolution,
            RuleKind::BatchSize,
            RuleKind::TransactionBoundary,
            RuleKind::RollbackStrategy,
        ];
        ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Kinds that operate over the whole row set rather than row by row
    pub fn is_row_set_wide(self) -> bool {
        matches!(
            self,
            RuleKind::RequiredColumns
                | RuleKind::RemoveDuplicates
                | RuleKind::FieldMapping
                | RuleKind::ConflictResolution
                | RuleKind::BatchSize
                | RuleKind::TransactionBoundary
                | RuleKind::RollbackStrategy
        )
    }
}

/// A configured, phase-scoped transformation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub phase: Phase,
    pub kind: RuleKind,
    /// Comma-separated field name list
    pub target: String,
    /// Parameter block, shape depends on `kind`
    pub config: serde_json::Value,
    /// Lower runs earlier; ties break by insertion order
    pub priority: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Target field names, split and trimmed
    pub fn targets(&self) -> Vec<String> {
        self.target
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate kind/phase consistency and config shape
    ///
    /// Called at save time; a rule that passes here deserializes cleanly at
    /// run time.
    pub fn validate(&self) -> Result<(), String> {
        if self.kind.phase() != self.phase {
            return Err(format!(
                "Rule kind {:?} belongs to phase {}, not {}",
                self.kind,
                self.kind.phase(),
                self.phase
            ));
        }
        if self.targets().is_empty() && !matches!(self.kind, RuleKind::FieldMapping) {
            return Err("Rule target must name at least one field".to_string());
        }
        RuleConfig::parse(self.kind, &self.config).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Per-kind config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimSides {
    #[default]
    Both,
    Left,
    Right,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    pub sides: TrimSides,
    /// Characters to strip; whitespace when absent
    pub chars: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexReplaceConfig {
    pub pattern: String,
    pub replacement: String,
    /// Flag characters: i, m, s, x
    #[serde(default)]
    pub flags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactReplacement {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactReplaceConfig {
    /// First matching entry wins per value
    pub replacements: Vec<ExactReplacement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// De-duplicate tokens within one delimited field value
    #[default]
    Field,
    /// Drop later rows whose target-field key repeats
    Rows,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveDuplicatesConfig {
    pub delimiter: String,
    pub case_sensitive: bool,
    pub scope: DedupScope,
}

impl Default for RemoveDuplicatesConfig {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            case_sensitive: false,
            scope: DedupScope::Field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    Upper,
    Lower,
    Title,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConvertConfig {
    pub mode: CaseMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFormatConfig {
    /// chrono format strings tried in order
    #[serde(default = "DateFormatConfig::default_from_formats")]
    pub from_formats: Vec<String>,
    pub to_format: String,
}

impl DateFormatConfig {
    fn default_from_formats() -> Vec<String> {
        vec![
            "%Y-%m-%d".to_string(),
            "%m/%d/%Y".to_string(),
            "%d-%b-%Y".to_string(),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormatConfig {
    /// Round and pad to this many decimal places when present
    pub decimal_places: Option<u32>,
    /// Strip grouping separators (commas) before parsing
    pub strip_grouping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcOperation {
    #[default]
    Concat,
    Sum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateFieldConfig {
    #[serde(default)]
    pub operation: CalcOperation,
    /// Input field names, read from the row
    pub inputs: Vec<String>,
    #[serde(default = "CalculateFieldConfig::default_separator")]
    pub separator: String,
}

impl CalculateFieldConfig {
    fn default_separator() -> String {
        " ".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappingConfig {
    /// Raw CSV header this override applies to
    pub csv_header: String,
    /// Canonical asset field it maps to
    pub asset_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumMappingConfig {
    /// Source vocabulary value to canonical value. Keys are folded to
    /// lowercase at parse time when `case_insensitive` is set.
    pub mapping: HashMap<String, String>,
    #[serde(default = "EnumMappingConfig::default_case_insensitive")]
    pub case_insensitive: bool,
    /// Used when no mapping entry matches; unmatched values pass through
    /// unchanged when absent
    #[serde(default)]
    pub default: Option<String>,
}

impl EnumMappingConfig {
    fn default_case_insensitive() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceLookupConfig {
    /// Lookup table keyed by incoming value
    pub table: HashMap<String, String>,
    /// Value used on a lookup miss; miss keeps the original value when absent
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultValueConfig {
    /// Fill when the target field is absent or blank
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictPolicy {
    /// Replace the existing asset's fields
    #[default]
    Overwrite,
    /// Leave the existing asset untouched
    Skip,
    /// Keep existing field values, add only missing ones
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictResolutionConfig {
    pub policy: ConflictPolicy,
    /// Asset field used as the conflict key
    pub key_field: String,
}

impl Default for ConflictResolutionConfig {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::Overwrite,
            key_field: "assetTag".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSizeConfig {
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxBoundary {
    /// One transaction per batch
    #[default]
    Batch,
    /// Each row written independently
    Row,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionBoundaryConfig {
    pub boundary: TxBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackMode {
    /// A batch failure undoes the whole batch; its rows become row errors
    #[default]
    RollbackBatch,
    /// Retry rows of a failed batch individually, error only the failures
    LogAndSkip,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackStrategyConfig {
    pub strategy: RollbackMode,
}

/// Deserialized rule parameters, discriminated by kind
#[derive(Debug, Clone)]
pub enum RuleConfig {
    RequiredColumns,
    NonEmpty,
    Trim(TrimConfig),
    RegexReplace(RegexReplaceConfig),
    ExactReplace(ExactReplaceConfig),
    RemoveDuplicates(RemoveDuplicatesConfig),
    CaseConvert(CaseConvertConfig),
    DateFormat(DateFormatConfig),
    NumberFormat(NumberFormatConfig),
    CalculateField(CalculateFieldConfig),
    FieldMapping(FieldMappingConfig),
    EnumMapping(EnumMappingConfig),
    ReferenceLookup(ReferenceLookupConfig),
    DefaultValue(DefaultValueConfig),
    ConflictResolution(ConflictResolutionConfig),
    BatchSize(BatchSizeConfig),
    TransactionBoundary(TransactionBoundaryConfig),
    RollbackStrategy(RollbackStrategyConfig),
}

impl RuleConfig {
    /// Parse a rule's JSON config against its kind's expected shape
    pub fn parse(kind: RuleKind, config: &serde_json::Value) -> Result<Self, String> {
        fn de<T: serde::de::DeserializeOwned>(
            kind: RuleKind,
            config: &serde_json::Value,
        ) -> Result<T, String> {
            serde_json::from_value(config.clone())
                .map_err(|e| format!("Invalid config for {:?}: {}", kind, e))
        }

        let parsed = match kind {
            RuleKind::RequiredColumns => RuleConfig::RequiredColumns,
            RuleKind::NonEmpty => RuleConfig::NonEmpty,
            RuleKind::Trim => RuleConfig::Trim(de(kind, config)?),
            RuleKind::RegexReplace => {
                let cfg: RegexReplaceConfig = de(kind, config)?;
                // Pattern must compile, checked here so bad patterns are
                // rejected at save time
                crate::engine::clean::build_regex(&cfg)
                    .map_err(|e| format!("Invalid config for {:?}: {}", kind, e))?;
                RuleConfig::RegexReplace(cfg)
            }
            RuleKind::ExactReplace => RuleConfig::ExactReplace(de(kind, config)?),
            RuleKind::RemoveDuplicates => {
                let cfg: RemoveDuplicatesConfig = de(kind, config)?;
                if cfg.delimiter.is_empty() {
                    return Err(format!("Invalid config for {:?}: empty delimiter", kind));
                }
                RuleConfig::RemoveDuplicates(cfg)
            }
            RuleKind::CaseConvert => RuleConfig::CaseConvert(de(kind, config)?),
            RuleKind::DateFormat => RuleConfig::DateFormat(de(kind, config)?),
            RuleKind::NumberFormat => RuleConfig::NumberFormat(de(kind, config)?),
            RuleKind::CalculateField => {
                let cfg: CalculateFieldConfig = de(kind, config)?;
                if cfg.inputs.is_empty() {
                    return Err(format!("Invalid config for {:?}: no input fields", kind));
                }
                RuleConfig::CalculateField(cfg)
            }
            RuleKind::FieldMapping => RuleConfig::FieldMapping(de(kind, config)?),
            RuleKind::EnumMapping => {
                let mut cfg: EnumMappingConfig = de(kind, config)?;
                if cfg.case_insensitive {
                    // Fold keys once here so lookups stay deterministic even
                    // when authored keys differ only in case
                    let mut folded = HashMap::with_capacity(cfg.mapping.len());
                    for (from, to) in std::mem::take(&mut cfg.mapping) {
                        if folded.insert(from.to_lowercase(), to).is_some() {
                            return Err(format!(
                                "Invalid config for {:?}: mapping key '{}' repeats case-insensitively",
                                kind, from
                            ));
                        }
                    }
                    cfg.mapping = folded;
                }
                RuleConfig::EnumMapping(cfg)
            }
            RuleKind::ReferenceLookup => RuleConfig::ReferenceLookup(de(kind, config)?),
            RuleKind::DefaultValue => RuleConfig::DefaultValue(de(kind, config)?),
            RuleKind::ConflictResolution => RuleConfig::ConflictResolution(de(kind, config)?),
            RuleKind::BatchSize => {
                let cfg: BatchSizeConfig = de(kind, config)?;
                if cfg.size == 0 {
                    return Err(format!("Invalid config for {:?}: size must be >= 1", kind));
                }
                RuleConfig::BatchSize(cfg)
            }
            RuleKind::TransactionBoundary => RuleConfig::TransactionBoundary(de(kind, config)?),
            RuleKind::RollbackStrategy => RuleConfig::RollbackStrategy(de(kind, config)?),
        };
        Ok(parsed)
    }
}

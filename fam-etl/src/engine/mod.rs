//! Rule Engine
//!
//! Applies one phase's active rules to a row set. Rules arrive already
//! ordered (ascending priority, insertion order on ties, see the rule
//! snapshot); the engine selects candidates by target intersection,
//! dispatches on the closed rule kind, and records failures row-by-row
//! without ever aborting the run.

pub mod clean;
pub mod map_rules;
pub mod transform;
pub mod validate;

use crate::models::rule::{DedupScope, RuleConfig};
use crate::models::{Phase, Row, RowError, Rule};
use tracing::debug;

/// Result of applying one phase's rules
#[derive(Debug)]
pub struct Applied {
    pub rows: Vec<Row>,
    /// Names of rules that actually touched the row set
    pub rules_applied: Vec<String>,
    pub warnings: Vec<String>,
}

/// Apply `rules` (already priority-ordered) to `rows` for `phase`
///
/// Row-level failures are appended to `errors` and the pre-rule value is
/// kept; only the accumulator observes them.
pub fn apply_phase_rules(
    phase: Phase,
    rules: &[Rule],
    mut rows: Vec<Row>,
    errors: &mut Vec<RowError>,
) -> Applied {
    let mut rules_applied = Vec::new();
    let mut warnings = Vec::new();

    for rule in rules {
        debug_assert_eq!(rule.phase, phase);
        if !rule.is_active {
            continue;
        }

        let config = match RuleConfig::parse(rule.kind, &rule.config) {
            Ok(cfg) => cfg,
            Err(msg) => {
                // Should have been rejected at save time; fail the affected
                // rows, not the run
                warnings.push(format!("Rule '{}' has invalid config: {}", rule.name, msg));
                let field = rule.targets().into_iter().next();
                for row in &rows {
                    errors.push(RowError {
                        row_index: row.index,
                        field: field.clone(),
                        message: format!("rule '{}' config error: {}", rule.name, msg),
                    });
                }
                continue;
            }
        };

        let targets = rule.targets();
        let before = errors.len();
        let touched = match config {
            RuleConfig::Trim(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| Ok(clean::trim(&cfg, v)))
            }
            RuleConfig::RegexReplace(cfg) => match clean::build_regex(&cfg) {
                Ok(re) => per_target_value(&mut rows, &targets, errors, |v| {
                    Ok(re.replace_all(v, cfg.replacement.as_str()).into_owned())
                }),
                Err(e) => {
                    warnings.push(format!("Rule '{}' pattern rejected: {}", rule.name, e));
                    false
                }
            },
            RuleConfig::ExactReplace(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| Ok(clean::exact_replace(&cfg, v)))
            }
            RuleConfig::RemoveDuplicates(cfg) => match cfg.scope {
                DedupScope::Field => {
                    per_target_value(&mut rows, &targets, errors, |v| Ok(clean::dedup_tokens(&cfg, v)))
                }
                DedupScope::Rows => {
                    let before_len = rows.len();
                    rows = clean::dedup_rows(&cfg, rows, &targets);
                    rows.len() != before_len || before_len > 0
                }
            },
            RuleConfig::CaseConvert(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| {
                    Ok(transform::case_convert(&cfg, v))
                })
            }
            RuleConfig::DateFormat(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| transform::date_format(&cfg, v))
            }
            RuleConfig::NumberFormat(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| {
                    transform::number_format(&cfg, v)
                })
            }
            RuleConfig::CalculateField(cfg) => {
                let mut touched = false;
                for row in &mut rows {
                    for target in &targets {
                        match transform::calculate_field(&cfg, row) {
                            Ok(value) => {
                                row.set(target, value);
                                touched = true;
                            }
                            Err(msg) => {
                                errors.push(RowError::field(row.index, target, msg));
                            }
                        }
                    }
                }
                touched
            }
            RuleConfig::EnumMapping(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| {
                    Ok(map_rules::enum_map(&cfg, v))
                })
            }
            RuleConfig::ReferenceLookup(cfg) => {
                per_target_value(&mut rows, &targets, errors, |v| {
                    map_rules::reference_lookup(&cfg, v)
                })
            }
            RuleConfig::DefaultValue(cfg) => {
                // Fills absent fields too, so no intersection requirement
                let mut touched = false;
                for row in &mut rows {
                    for target in &targets {
                        if row.is_blank(target) {
                            row.set(target, cfg.value.clone());
                            touched = true;
                        }
                    }
                }
                touched
            }
            RuleConfig::NonEmpty => {
                for row in &rows {
                    for target in &targets {
                        if row.is_blank(target) {
                            errors.push(RowError::field(
                                row.index,
                                target,
                                "required value is empty",
                            ));
                        }
                    }
                }
                !rows.is_empty()
            }
            // Structural and policy kinds are consumed by their phases, not
            // by per-row dispatch
            RuleConfig::RequiredColumns
            | RuleConfig::FieldMapping(_)
            | RuleConfig::ConflictResolution(_)
            | RuleConfig::BatchSize(_)
            | RuleConfig::TransactionBoundary(_)
            | RuleConfig::RollbackStrategy(_) => false,
        };

        if touched {
            debug!(
                rule = %rule.name,
                kind = ?rule.kind,
                phase = %phase,
                new_errors = errors.len() - before,
                "Rule applied"
            );
            rules_applied.push(rule.name.clone());
        }
    }

    Applied {
        rows,
        rules_applied,
        warnings,
    }
}

/// Apply a value transform to every (row, target) pair where the field exists
///
/// A failing transform records a row error and keeps the pre-rule value.
fn per_target_value<F>(
    rows: &mut [Row],
    targets: &[String],
    errors: &mut Vec<RowError>,
    f: F,
) -> bool
where
    F: Fn(&str) -> Result<String, String>,
{
    let mut touched = false;
    for row in rows.iter_mut() {
        for target in targets {
            let Some(current) = row.get(target).map(|s| s.to_string()) else {
                continue;
            };
            match f(&current) {
                Ok(next) => {
                    if next != current {
                        row.set(target, next);
                    }
                    touched = true;
                }
                Err(msg) => {
                    errors.push(RowError::field(row.index, target, msg));
                    touched = true;
                }
            }
        }
    }
    touched
}

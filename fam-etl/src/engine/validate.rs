//! VALIDATE phase structural checks

use crate::models::Rule;

/// Columns named by a REQUIRED_COLUMNS rule that are absent from the header set
pub fn missing_required_columns(rule: &Rule, headers: &[String]) -> Vec<String> {
    rule.targets()
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h == col))
        .collect()
}

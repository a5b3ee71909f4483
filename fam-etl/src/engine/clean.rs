//! CLEAN phase transforms: text cleaning

use crate::models::rule::{
    ExactReplaceConfig, RegexReplaceConfig, RemoveDuplicatesConfig, TrimConfig, TrimSides,
};
use crate::models::Row;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Compile a REGEX_REPLACE pattern with its flag characters
///
/// Supported flags: i (case-insensitive), m (multi-line), s (dot matches
/// newline), x (ignore whitespace). Unknown flags are ignored; a global
/// flag is implied since replacement always uses replace_all.
pub fn build_regex(cfg: &RegexReplaceConfig) -> Result<Regex, regex::Error> {
    let mut builder = RegexBuilder::new(&cfg.pattern);
    for flag in cfg.flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    builder.build()
}

/// Strip configured side(s), whitespace by default
pub fn trim(cfg: &TrimConfig, value: &str) -> String {
    match &cfg.chars {
        None => match cfg.sides {
            TrimSides::Both => value.trim().to_string(),
            TrimSides::Left => value.trim_start().to_string(),
            TrimSides::Right => value.trim_end().to_string(),
        },
        Some(chars) => {
            let set: Vec<char> = chars.chars().collect();
            let matcher = |c: char| set.contains(&c);
            match cfg.sides {
                TrimSides::Both => value.trim_matches(matcher).to_string(),
                TrimSides::Left => value.trim_start_matches(matcher).to_string(),
                TrimSides::Right => value.trim_end_matches(matcher).to_string(),
            }
        }
    }
}

/// Whole-value literal replacement; first matching entry wins
pub fn exact_replace(cfg: &ExactReplaceConfig, value: &str) -> String {
    for entry in &cfg.replacements {
        if entry.from == value {
            return entry.to.clone();
        }
    }
    value.to_string()
}

/// Split a delimited field, drop repeated tokens, rejoin
///
/// Comparison is case-insensitive unless configured otherwise; the first
/// occurrence's spelling and order are kept.
pub fn dedup_tokens(cfg: &RemoveDuplicatesConfig, value: &str) -> String {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for token in value.split(&cfg.delimiter) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let key = if cfg.case_sensitive {
            token.to_string()
        } else {
            token.to_lowercase()
        };
        if seen.insert(key) {
            kept.push(token);
        }
    }
    kept.join(&cfg.delimiter)
}

/// Row-set-wide variant: drop later rows whose target-field key repeats
pub fn dedup_rows(cfg: &RemoveDuplicatesConfig, rows: Vec<Row>, targets: &[String]) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| {
            let key: Vec<String> = targets
                .iter()
                .map(|t| {
                    let v = row.get(t).unwrap_or("");
                    if cfg.case_sensitive {
                        v.to_string()
                    } else {
                        v.to_lowercase()
                    }
                })
                .collect();
            seen.insert(key)
        })
        .collect()
}

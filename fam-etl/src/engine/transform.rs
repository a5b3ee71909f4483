//! TRANSFORM phase transforms: value shaping

use crate::models::rule::{
    CalcOperation, CalculateFieldConfig, CaseConvertConfig, CaseMode, DateFormatConfig,
    NumberFormatConfig,
};
use crate::models::Row;
use chrono::NaiveDate;

pub fn case_convert(cfg: &CaseConvertConfig, value: &str) -> String {
    match cfg.mode {
        CaseMode::Upper => value.to_uppercase(),
        CaseMode::Lower => value.to_lowercase(),
        CaseMode::Title => title_case(value),
    }
}

/// Capitalize the first letter of each whitespace-separated word
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Reparse a date through the configured source formats and reformat
///
/// Formats are tried in order; an unparseable value is a row-scoped error.
pub fn date_format(cfg: &DateFormatConfig, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    for fmt in &cfg.from_formats {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(date.format(&cfg.to_format).to_string());
        }
    }
    Err(format!("'{}' does not match any configured date format", value))
}

/// Normalize a numeric string, optionally fixing decimal places
pub fn number_format(cfg: &NumberFormatConfig, value: &str) -> Result<String, String> {
    let mut cleaned = value.trim().to_string();
    if cfg.strip_grouping {
        cleaned = cleaned.replace(',', "");
    }
    let parsed: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    Ok(match cfg.decimal_places {
        Some(places) => format!("{:.*}", places as usize, parsed),
        None => cleaned,
    })
}

/// Derive a field from other fields in the same row
pub fn calculate_field(cfg: &CalculateFieldConfig, row: &Row) -> Result<String, String> {
    let mut values = Vec::with_capacity(cfg.inputs.len());
    for input in &cfg.inputs {
        match row.get(input) {
            Some(v) => values.push(v),
            None => return Err(format!("input field '{}' is missing", input)),
        }
    }
    match cfg.operation {
        CalcOperation::Concat => Ok(values.join(&cfg.separator)),
        CalcOperation::Sum => {
            let mut sum = 0.0f64;
            for (input, v) in cfg.inputs.iter().zip(&values) {
                sum += v
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("input field '{}' is not numeric: '{}'", input, v))?;
            }
            // Integral sums print without a trailing .0
            if sum.fract() == 0.0 {
                Ok(format!("{}", sum as i64))
            } else {
                Ok(format!("{}", sum))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_words() {
        let cfg = CaseConvertConfig { mode: CaseMode::Title };
        assert_eq!(case_convert(&cfg, "carrier CORP air"), "Carrier Corp Air");
    }

    #[test]
    fn date_reformats_through_first_matching_format() {
        let cfg = DateFormatConfig {
            from_formats: vec!["%m/%d/%Y".to_string(), "%Y-%m-%d".to_string()],
            to_format: "%Y-%m-%d".to_string(),
        };
        assert_eq!(date_format(&cfg, "03/15/2021").unwrap(), "2021-03-15");
        assert_eq!(date_format(&cfg, "2021-03-15").unwrap(), "2021-03-15");
        assert!(date_format(&cfg, "soon").is_err());
    }

    #[test]
    fn number_strips_grouping_and_fixes_places() {
        let cfg = NumberFormatConfig {
            decimal_places: Some(2),
            strip_grouping: true,
        };
        assert_eq!(number_format(&cfg, "1,234.5").unwrap(), "1234.50");
        assert!(number_format(&cfg, "n/a").is_err());
    }

    #[test]
    fn calculate_concat_and_sum() {
        let mut row = Row::new(0);
        row.set("building", "B1".to_string());
        row.set("room", "204".to_string());
        row.set("a", "2".to_string());
        row.set("b", "3.5".to_string());

        let concat = CalculateFieldConfig {
            operation: CalcOperation::Concat,
            inputs: vec!["building".to_string(), "room".to_string()],
            separator: "-".to_string(),
        };
        assert_eq!(calculate_field(&concat, &row).unwrap(), "B1-204");

        let sum = CalculateFieldConfig {
            operation: CalcOperation::Sum,
            inputs: vec!["a".to_string(), "b".to_string()],
            separator: " ".to_string(),
        };
        assert_eq!(calculate_field(&sum, &row).unwrap(), "5.5");
    }

    #[test]
    fn calculate_missing_input_is_an_error() {
        let row = Row::new(0);
        let cfg = CalculateFieldConfig {
            operation: CalcOperation::Concat,
            inputs: vec!["absent".to_string()],
            separator: " ".to_string(),
        };
        assert!(calculate_field(&cfg, &row).is_err());
    }
}

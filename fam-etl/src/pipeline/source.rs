//! CSV row source
//!
//! Turns uploaded CSV text into a raw header/record table for the EXTRACT
//! phase. Delimiter handling is deliberately shallow: the header line is
//! sniffed for comma, semicolon, and tab, nothing more.

use csv::ReaderBuilder;

/// Parsed but not yet normalized tabular data
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

/// Parse CSV text into a raw table
///
/// Returns a human-readable reason on failure; the caller decides whether
/// that aborts the run.
pub fn parse_csv(content: &str) -> Result<RawTable, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
        return Err("file is empty".to_string());
    }

    let delimiter = sniff_delimiter(content);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("cannot read header row: {}", e))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err("header row is empty".to_string());
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| format!("cannot parse row: {}", e))?;
        records.push(record.iter().map(|v| v.to_string()).collect());
    }

    Ok(RawTable { headers, records })
}

/// Pick the candidate delimiter that appears most often in the header line
fn sniff_delimiter(content: &str) -> u8 {
    let header_line = content.lines().next().unwrap_or("");
    let candidates = [b',', b';', b'\t'];
    candidates
        .into_iter()
        .max_by_key(|&d| header_line.matches(d as char).count())
        .unwrap_or(b',')
}

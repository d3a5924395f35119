// CSV Ingestion - uploaded files to Rows
//
// Field names come from the header row; every cell lands as a text value
// in column order. Fully-empty rows are dropped before they reach the
// resolver. Ragged records are tolerated.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use crate::row::{FieldValue, Row};

/// Load rows from a CSV file on disk.
pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open CSV file {:?}", path))?;
    parse_rows(file)
}

/// Parse rows from any CSV reader.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("failed to read CSV headers")?
        .clone();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.context("failed to read CSV record")?;

        let mut row = Row::new();
        let mut has_value = false;
        for (index, header) in headers.iter().enumerate() {
            let value = record.get(index).unwrap_or("");
            if !value.trim().is_empty() {
                has_value = true;
            }
            row.insert(header, FieldValue::Text(value.to_string()));
        }

        if has_value {
            rows.push(row);
        }
    }

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_derived_field_names() {
        let csv = "Company Name,Website\nAcme Inc,www.acme.com\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get_ignore_case("company name"),
            Some(&FieldValue::Text("Acme Inc".to_string()))
        );
        assert_eq!(
            rows[0].get_ignore_case("website"),
            Some(&FieldValue::Text("www.acme.com".to_string()))
        );
    }

    #[test]
    fn test_fully_empty_rows_dropped() {
        let csv = "name,website\nAcme,acme.com\n,\n  , \nGlobex,\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1].get_ignore_case("name"),
            Some(&FieldValue::Text("Globex".to_string()))
        );
    }

    #[test]
    fn test_ragged_records_tolerated() {
        let csv = "name,website,notes\nAcme,acme.com\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        // Missing trailing cell lands as empty text
        assert_eq!(
            rows[0].get_ignore_case("notes"),
            Some(&FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn test_column_order_preserved() {
        let csv = "zeta,alpha\n1,2\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();

        let names: Vec<&str> = rows[0].fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_rows_feed_extraction() {
        let csv = "Company Name,Website\nAcme Inc,www.acme.com\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();
        let signals = crate::extract::extract_signals(&rows[0]);

        assert_eq!(signals.organization_name, Some("acme inc".to_string()));
        assert_eq!(signals.website_hostname, Some("acme.com".to_string()));
    }
}

// Field Extractor - identity signals from schema-less rows
//
// Pulls a likely organization name and a likely website hostname out of an
// arbitrary key/value row. Field names are matched case-insensitively
// against fixed priority lists; the organization scan additionally falls
// back to the first plausible value anywhere in the row.

use serde::Serialize;

use crate::hostname::normalize_hostname;
use crate::row::Row;

/// Priority field names for the organization scan, checked in order.
/// Covers the common CSV header spellings, including the spaced variant.
const ORGANIZATION_FIELDS: &[&str] =
    &["company", "name", "company_name", "companyname", "company name"];

/// Priority field names for the website scan, checked in order.
const WEBSITE_FIELDS: &[&str] = &["website", "url", "domain", "site"];

/// Values longer than this (in characters) are ignored by the fallback
/// scan - long free text is unlikely to be a name.
const MAX_FALLBACK_NAME_LEN: usize = 120;

// ============================================================================
// EXTRACTED SIGNALS
// ============================================================================

/// Normalized identity signals derived from one row.
///
/// `organization_name` is lowercase, trimmed, with whitespace runs
/// collapsed; `website_hostname` carries no scheme, "www." prefix, path,
/// query, or fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedSignals {
    pub organization_name: Option<String>,
    pub website_hostname: Option<String>,
}

/// Derive both signals from a row.
pub fn extract_signals(row: &Row) -> ExtractedSignals {
    ExtractedSignals {
        organization_name: extract_organization_name(row),
        website_hostname: extract_website_hostname(row),
    }
}

// ============================================================================
// ORGANIZATION NAME
// ============================================================================

/// Likely organization name: priority fields first, then the first
/// non-null scalar anywhere in the row whose normalized form fits.
pub fn extract_organization_name(row: &Row) -> Option<String> {
    for field in ORGANIZATION_FIELDS {
        if let Some(value) = row.get_ignore_case(field) {
            if let Some(text) = value.as_text() {
                let normalized = normalize_name(&text);
                if !normalized.is_empty() {
                    return Some(normalized);
                }
            }
        }
    }

    for (_, value) in row.fields() {
        if let Some(text) = value.as_text() {
            let normalized = normalize_name(&text);
            if !normalized.is_empty() && normalized.chars().count() <= MAX_FALLBACK_NAME_LEN {
                return Some(normalized);
            }
        }
    }

    None
}

/// Trim, lowercase, collapse internal whitespace runs to single spaces.
pub fn normalize_name(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// WEBSITE HOSTNAME
// ============================================================================

/// Likely website hostname: priority fields only, no all-fields fallback.
/// Each candidate value runs through the hostname normalizer; the first
/// that yields a hostname wins.
pub fn extract_website_hostname(row: &Row) -> Option<String> {
    for field in WEBSITE_FIELDS {
        if let Some(value) = row.get_ignore_case(field) {
            if let Some(text) = value.as_text() {
                if let Some(host) = normalize_hostname(&text) {
                    return Some(host);
                }
            }
        }
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

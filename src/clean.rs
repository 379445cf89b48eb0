//! Attribute hygiene shared by the loading, validation and conversion layers.
//!
//! Every attribute name that enters the entity graph goes through
//! [`clean_name`], and every candidate value can be screened with
//! [`is_not_applicable`] so the sentinel markers used by submitters
//! (`NP`, `NA`, `NC`) never masquerade as real values downstream.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

/// Sentinel markers submitters use for "not applicable" cells.
const NOT_APPLICABLE: [&str; 3] = ["NP", "NA", "NC"];

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// Normalizes an attribute name: trimmed, lowercased, spaces and slashes
/// folded to underscores.
pub fn clean_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '/'], "_")
}

/// Normalizes an entity type name. Header cells carry trailing qualifiers
/// after a dash (`"Sample - mandatory"`), which are stripped before cleaning.
pub fn clean_entity_name(name: &str) -> String {
    let head = name.split('-').next().unwrap_or(name);
    clean_name(head)
}

/// Normalizes a value for accepted-values membership checks.
pub fn clean_validation(value: &str) -> String {
    value.trim().to_lowercase()
}

/// True when the value is one of the "not applicable" sentinels.
///
/// Matching is exact on the upper-case forms the submission templates use,
/// so free-text values like "na" survive untouched.
pub fn is_not_applicable(value: &str) -> bool {
    NOT_APPLICABLE.contains(&value.trim())
}

/// True when the value is a calendar-valid ISO-8601 date (`YYYY-MM-DD`).
pub fn is_valid_date(value: &str) -> bool {
    ISO_DATE.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

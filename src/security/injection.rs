use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::find_string_leaf;

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bOR\b\s+\d+\s*=\s*\d+",
        r"(?i)\bAND\b\s+\d+\s*=\s*\d+",
        r"(?i)\bUNION\b.*\bSELECT\b",
        r"(?i)\bDROP\b.*\bTABLE\b",
        r"(?i)\bDELETE\b.*\bFROM\b",
        r"(?i)\bINSERT\b.*\bINTO\b",
        r"(?i)\bUPDATE\b.*\bSET\b",
        r"--",
        r";.*--",
        r"(?i)'.*OR.*'.*=.*'",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static injection pattern"))
    .collect()
});

/// True when the string matches any SQL-injection signature.
pub fn contains_sql_injection(value: &str) -> bool {
    !value.is_empty() && SQL_PATTERNS.iter().any(|pattern| pattern.is_match(value))
}

/// Path of the first string leaf carrying an injection signature, if any.
pub fn find_injection(value: &Value, prefix: &str) -> Option<String> {
    find_string_leaf(value, prefix, &contains_sql_injection)
}

// src/filter/name.rs
//
// Basename matching: exact unless the pattern carries glob metacharacters.

use glob::{MatchOptions, Pattern};

use super::Filter;
use crate::error::{Result, StoreError};
use crate::object_store::ObjectEntry;

const GLOB_META: &[char] = &['*', '?', '['];

#[derive(Debug, Clone)]
enum NameMatcher {
    Exact(String),
    Glob(Pattern),
}

/// Name clause, matched against the last path component of a key.
#[derive(Debug, Clone)]
pub struct NameClause {
    raw: String,
    matcher: NameMatcher,
    case_sensitive: bool,
}

impl NameClause {
    pub fn parse(raw: &str, case_insensitive: bool) -> Result<Self> {
        if raw.is_empty() {
            return Err(StoreError::InvalidFilter("name filter is empty".into()));
        }

        let matcher = if raw.contains(GLOB_META) {
            let pattern = Pattern::new(raw).map_err(|e| {
                StoreError::InvalidFilter(format!("invalid name pattern '{}': {}", raw, e))
            })?;
            NameMatcher::Glob(pattern)
        } else {
            NameMatcher::Exact(raw.to_string())
        };

        Ok(Self {
            raw: raw.to_string(),
            matcher,
            case_sensitive: !case_insensitive,
        })
    }

    pub fn matches_name(&self, name: &str) -> bool {
        match &self.matcher {
            NameMatcher::Exact(expected) if self.case_sensitive => name == expected,
            NameMatcher::Exact(expected) => name.to_lowercase() == expected.to_lowercase(),
            NameMatcher::Glob(pattern) => pattern.matches_with(
                name,
                MatchOptions {
                    case_sensitive: self.case_sensitive,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
        }
    }
}

impl Filter for NameClause {
    fn matches(&self, entry: &ObjectEntry) -> bool {
        self.matches_name(entry.basename())
    }

    fn description(&self) -> String {
        match self.matcher {
            NameMatcher::Exact(_) => format!("name={}", self.raw),
            NameMatcher::Glob(_) => format!("name~{}", self.raw),
        }
    }
}

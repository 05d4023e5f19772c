// src/filter/mod.rs
//! Listing filters.
//!
//! A [`FilterSpec`] is the user-facing description (`name`, `size`, `mtime`
//! strings); [`FilterSpec::compile`] validates it once and yields an
//! [`ObjectFilter`] that the listing engine evaluates per entry.
//!
//! ```
//! use bucketwalk::filter::{Filter, FilterSpec};
//! use bucketwalk::ObjectEntry;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let filter = FilterSpec::new()
//!     .with_name("*.parquet")
//!     .with_size(">1K")
//!     .compile(now)
//!     .unwrap();
//!
//! assert!(filter.matches(&ObjectEntry::object("data/a.parquet", 4096, now)));
//! assert!(!filter.matches(&ObjectEntry::object("data/a.parquet", 10, now)));
//! assert!(!filter.matches(&ObjectEntry::object("data/a.json", 4096, now)));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::object_store::ObjectEntry;

mod mtime;
mod name;
mod size;

pub use mtime::MtimeClause;
pub use name::NameClause;
pub use size::SizeClause;

/// A predicate over listing entries.
pub trait Filter: Send + Sync {
    fn matches(&self, entry: &ObjectEntry) -> bool;

    /// Human-readable form for logs.
    fn description(&self) -> String;
}

// -----------------------------------------------------------------------------
// Comparators shared by size and mtime clauses
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Comparator {
    /// Parse an optional operator token; absent means equality.
    fn parse(op: Option<&str>) -> Option<Self> {
        match op.unwrap_or("=") {
            "=" => Some(Comparator::Eq),
            "<" => Some(Comparator::Lt),
            ">" => Some(Comparator::Gt),
            "<=" => Some(Comparator::Le),
            ">=" => Some(Comparator::Ge),
            _ => None,
        }
    }

    fn holds<T: PartialOrd>(self, value: T, threshold: T) -> bool {
        match self {
            Comparator::Eq => value == threshold,
            Comparator::Lt => value < threshold,
            Comparator::Gt => value > threshold,
            Comparator::Le => value <= threshold,
            Comparator::Ge => value >= threshold,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Lt => "<",
            Comparator::Gt => ">",
            Comparator::Le => "<=",
            Comparator::Ge => ">=",
        }
    }
}

// -----------------------------------------------------------------------------
// User-facing filter description
// -----------------------------------------------------------------------------

/// A filter value as callers supply it: one string or a list of strings.
///
/// Only the first element of a list is honoured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

impl FilterValue {
    /// The effective value; `None` for an empty list.
    pub fn first(&self, key: &str) -> Option<&str> {
        match self {
            FilterValue::Single(s) => Some(s.as_str()),
            FilterValue::List(values) => {
                if values.len() > 1 {
                    warn!(
                        filter = key,
                        used = %values[0],
                        dropped = values.len() - 1,
                        "filter list has several values; only the first is applied"
                    );
                }
                values.first().map(String::as_str)
            }
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Single(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Single(s)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(v: Vec<String>) -> Self {
        FilterValue::List(v)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(v: Vec<&str>) -> Self {
        FilterValue::List(v.into_iter().map(str::to_string).collect())
    }
}

/// Requested filter clauses. Every present clause must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSpec {
    /// Basename: exact string, or a glob when it contains `*`, `?` or `[`
    pub name: Option<FilterValue>,

    /// e.g. `>100K`, `<=2G`, `1M-5M`
    pub size: Option<FilterValue>,

    /// e.g. `>1D`, `<30M`, `1D12H`
    pub mtime: Option<FilterValue>,

    /// Case-insensitive name matching
    pub case_insensitive: bool,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<FilterValue>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<FilterValue>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_mtime(mut self, mtime: impl Into<FilterValue>) -> Self {
        self.mtime = Some(mtime.into());
        self
    }

    pub fn with_case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Build from a dictionary with keys `name`, `size` and `mtime`.
    pub fn from_map(map: HashMap<String, FilterValue>) -> Result<Self> {
        let mut spec = FilterSpec::default();
        for (key, value) in map {
            match key.as_str() {
                "name" => spec.name = Some(value),
                "size" => spec.size = Some(value),
                "mtime" => spec.mtime = Some(value),
                other => {
                    return Err(StoreError::InvalidFilter(format!(
                        "unknown filter key '{}' (expected name, size or mtime)",
                        other
                    )));
                }
            }
        }
        Ok(spec)
    }

    /// True when no clause would take effect.
    pub fn is_empty(&self) -> bool {
        let effective = |v: &Option<FilterValue>| match v {
            None => false,
            Some(FilterValue::Single(_)) => true,
            Some(FilterValue::List(values)) => !values.is_empty(),
        };
        !(effective(&self.name) || effective(&self.size) || effective(&self.mtime))
    }

    /// Validate every clause. `now` anchors mtime ages for the whole traversal.
    pub fn compile(&self, now: DateTime<Utc>) -> Result<ObjectFilter> {
        let name = self
            .name
            .as_ref()
            .and_then(|v| v.first("name"))
            .map(|s| NameClause::parse(s, self.case_insensitive))
            .transpose()?;
        let size = self
            .size
            .as_ref()
            .and_then(|v| v.first("size"))
            .map(SizeClause::parse)
            .transpose()?;
        let mtime = self
            .mtime
            .as_ref()
            .and_then(|v| v.first("mtime"))
            .map(|s| MtimeClause::parse(s, now))
            .transpose()?;

        Ok(ObjectFilter { name, size, mtime })
    }
}

// -----------------------------------------------------------------------------
// Compiled predicate
// -----------------------------------------------------------------------------

/// Conjunction of the compiled clauses, evaluated name, then size, then mtime.
#[derive(Debug, Clone, Default)]
pub struct ObjectFilter {
    name: Option<NameClause>,
    size: Option<SizeClause>,
    mtime: Option<MtimeClause>,
}

impl ObjectFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.size.is_none() && self.mtime.is_none()
    }
}

impl Filter for ObjectFilter {
    fn matches(&self, entry: &ObjectEntry) -> bool {
        self.name.as_ref().is_none_or(|c| c.matches(entry))
            && self.size.as_ref().is_none_or(|c| c.matches(entry))
            && self.mtime.as_ref().is_none_or(|c| c.matches(entry))
    }

    fn description(&self) -> String {
        let parts: Vec<String> = [
            self.name.as_ref().map(|c| c.description()),
            self.size.as_ref().map(|c| c.description()),
            self.mtime.as_ref().map(|c| c.description()),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(" AND ")
        }
    }
}

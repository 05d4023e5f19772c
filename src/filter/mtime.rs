// src/filter/mtime.rs
//
// Modification-age clauses: `[cmp]<n><unit>[<n><unit>...]`
// Units: S seconds, M minutes, H hours, D days, W weeks, Y 365-day years (any case).
//   >1D   older than one day
//   <30M  modified within the last 30 minutes
//   1D    between one and two days old

use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Comparator, Filter};
use crate::error::{Result, StoreError};
use crate::object_store::ObjectEntry;

static MTIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<op><=|>=|=|<|>)?(?P<body>(?:\d+[sSmMhHdDwWyY])+)$").unwrap());

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<value>\d+)(?P<unit>[sSmMhHdDwWyY])").unwrap());

fn unit_seconds(unit: &str) -> i64 {
    match unit.to_ascii_lowercase().as_str() {
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 7 * 86_400,
        "y" => 365 * 86_400,
        _ => 1,
    }
}

/// Compiled mtime clause, anchored to the `now` of the traversal.
#[derive(Debug, Clone)]
pub struct MtimeClause {
    op: Comparator,
    threshold: TimeDelta,
    /// Smallest unit in the expression; width of the `=` window
    granularity: TimeDelta,
    now: DateTime<Utc>,
}

impl MtimeClause {
    pub fn parse(raw: &str, now: DateTime<Utc>) -> Result<Self> {
        let text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || {
            StoreError::InvalidFilter(format!(
                "invalid mtime filter '{}' (expected e.g. '>1D', '<30M' or '1D12H')",
                raw
            ))
        };

        let caps = MTIME_RE.captures(&text).ok_or_else(invalid)?;
        let op = Comparator::parse(caps.name("op").map(|m| m.as_str())).ok_or_else(invalid)?;

        let mut total: i64 = 0;
        let mut smallest = i64::MAX;
        for token in TOKEN_RE.captures_iter(&caps["body"]) {
            let per_unit = unit_seconds(&token["unit"]);
            let secs = token["value"]
                .parse::<i64>()
                .ok()
                .and_then(|v| v.checked_mul(per_unit))
                .and_then(|s| total.checked_add(s))
                .ok_or_else(|| StoreError::InvalidFilter(format!("mtime '{}' is out of range", raw)))?;
            total = secs;
            smallest = smallest.min(per_unit);
        }

        let threshold = TimeDelta::try_seconds(total)
            .ok_or_else(|| StoreError::InvalidFilter(format!("mtime '{}' is out of range", raw)))?;
        let granularity = TimeDelta::try_seconds(smallest).ok_or_else(invalid)?;

        Ok(Self {
            op,
            threshold,
            granularity,
            now,
        })
    }

    /// Age test against the anchored `now`; entries without a time never match.
    pub fn matches_time(&self, last_modified: Option<DateTime<Utc>>) -> bool {
        let Some(modified) = last_modified else {
            return false;
        };
        let age = self.now - modified;

        match self.op {
            // find(1) style: "1D" means aged one day, rounded down to the unit
            Comparator::Eq => {
                age >= self.threshold
                    && self
                        .threshold
                        .checked_add(&self.granularity)
                        .is_none_or(|upper| age < upper)
            }
            op => op.holds(age, self.threshold),
        }
    }

    pub fn threshold(&self) -> TimeDelta {
        self.threshold
    }
}

impl Filter for MtimeClause {
    fn matches(&self, entry: &ObjectEntry) -> bool {
        self.matches_time(entry.last_modified)
    }

    fn description(&self) -> String {
        let secs = self.threshold.num_seconds().max(0) as u64;
        format!(
            "mtime{}{}",
            self.op.symbol(),
            humantime::format_duration(std::time::Duration::from_secs(secs))
        )
    }
}

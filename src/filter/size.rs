// src/filter/size.rs
//
// Size clauses: `[cmp]<n>[unit]` or an inclusive range `<n>[unit]-<n>[unit]`.
// Units are powers of 1024: b, k, M, G, T (any case).

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Comparator, Filter};
use crate::error::{Result, StoreError};
use crate::object_store::ObjectEntry;

static COMPARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<op><=|>=|=|<|>)?(?P<value>\d+)(?P<unit>[bBkKmMgGtT]?)$").unwrap());

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<lo>\d+)(?P<lo_unit>[bBkKmMgGtT]?)-(?P<hi>\d+)(?P<hi_unit>[bBkKmMgGtT]?)$").unwrap()
});

const KIB: u64 = 1024;

fn unit_multiplier(unit: &str) -> u64 {
    match unit.to_ascii_lowercase().as_str() {
        "k" => KIB,
        "m" => KIB.pow(2),
        "g" => KIB.pow(3),
        "t" => KIB.pow(4),
        _ => 1,
    }
}

fn to_bytes(raw: &str, value: &str, unit: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .ok()
        .and_then(|v| v.checked_mul(unit_multiplier(unit)))
        .ok_or_else(|| StoreError::InvalidFilter(format!("size '{}' is out of range", raw)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SizeRule {
    Compare(Comparator, u64),
    Range(u64, u64),
}

/// Compiled size clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeClause {
    rule: SizeRule,
}

impl SizeClause {
    pub fn parse(raw: &str) -> Result<Self> {
        let text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

        if let Some(caps) = RANGE_RE.captures(&text) {
            let lo = to_bytes(raw, &caps["lo"], &caps["lo_unit"])?;
            let hi = to_bytes(raw, &caps["hi"], &caps["hi_unit"])?;
            if lo > hi {
                return Err(StoreError::InvalidFilter(format!(
                    "size range '{}' has its lower bound above its upper bound",
                    raw
                )));
            }
            return Ok(Self {
                rule: SizeRule::Range(lo, hi),
            });
        }

        let caps = COMPARE_RE.captures(&text).ok_or_else(|| {
            StoreError::InvalidFilter(format!(
                "invalid size filter '{}' (expected e.g. '>100K', '<=2G' or '1M-5M')",
                raw
            ))
        })?;
        let op = Comparator::parse(caps.name("op").map(|m| m.as_str()))
            .ok_or_else(|| StoreError::InvalidFilter(format!("invalid size operator in '{}'", raw)))?;
        let bytes = to_bytes(raw, &caps["value"], &caps["unit"])?;

        Ok(Self {
            rule: SizeRule::Compare(op, bytes),
        })
    }

    pub fn matches_size(&self, size: u64) -> bool {
        match self.rule {
            SizeRule::Compare(op, threshold) => op.holds(size, threshold),
            SizeRule::Range(lo, hi) => (lo..=hi).contains(&size),
        }
    }
}

impl Filter for SizeClause {
    fn matches(&self, entry: &ObjectEntry) -> bool {
        self.matches_size(entry.size)
    }

    fn description(&self) -> String {
        match self.rule {
            SizeRule::Compare(op, bytes) => format!("size{}{}", op.symbol(), bytes),
            SizeRule::Range(lo, hi) => format!("size[{}..={}]", lo, hi),
        }
    }
}

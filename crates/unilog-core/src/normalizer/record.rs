//! A decoded JSON record plus the value coercions shared by every format.
//!
//! [`Record`] is consumed key by key: each `take_*` removes every alias it is
//! given, so whatever is left at the end is exactly the set of keys no
//! builder recognised. Those land in [`Event::extra`](crate::Event).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub(crate) struct Record {
    map: Map<String, Value>,
}

impl Record {
    pub fn new(map: Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(|v| !is_blank(v))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Remove every key in `aliases` and return the first non-blank value.
    pub fn take(&mut self, aliases: &[&str]) -> Option<Value> {
        let mut found = None;
        for key in aliases {
            if let Some(value) = self.map.remove(*key) {
                if found.is_none() && !is_blank(&value) {
                    found = Some(value);
                }
            }
        }
        found
    }

    pub fn take_string(&mut self, aliases: &[&str]) -> Option<String> {
        self.take(aliases).and_then(value_to_string)
    }

    pub fn take_object(&mut self, key: &str) -> Option<Record> {
        match self.map.remove(key) {
            Some(Value::Object(map)) => Some(Record::new(map)),
            Some(other) => {
                self.map.insert(key.to_string(), other);
                None
            }
            None => None,
        }
    }

    /// Fold another record's leftovers into this one without overwriting.
    pub fn absorb(&mut self, other: Record) {
        for (key, value) in other.map {
            self.map.entry(key).or_insert(value);
        }
    }

    pub fn into_extra(self) -> BTreeMap<String, Value> {
        self.map.into_iter().collect()
    }
}

/// Null, empty and the `-` placeholder both services use all mean "absent".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s == "-"
        }
        _ => false,
    }
}

pub(crate) fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s != "-").then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Milliseconds from a number or a string such as `"12.5ms"`. Anything that
/// does not parse degrades to `0.0`.
pub(crate) fn parse_duration_ms(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.strip_suffix("ms").unwrap_or(s).trim().parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|ms| ms.is_finite() && *ms >= 0.0).unwrap_or(0.0)
}

/// HTTP status from a number or numeric string; `0` when absent or invalid.
pub(crate) fn parse_status(value: Option<&Value>) -> u16 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%d/%b/%Y:%H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S,%3f",
    "%d/%b/%Y:%H:%M:%S",
];

/// Parse the timestamp shapes both services emit. Values without an offset
/// are taken to be UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

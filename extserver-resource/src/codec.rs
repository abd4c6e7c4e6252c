//! Per-attribute normalization and comparison.
//!
//! Every comparison in the engine goes through [`equal`], so that `""` and
//! absent, or `"30 s"` and `"30 seconds"`, are the same thing everywhere.

use extserver_core::AttributeValue;

use crate::{
    attributes::{AttributeKind, AttributeSpec},
    error::EngineError,
};

/// Structural cleanup that never fails: empty strings and empty sets
/// become absent, and numbers or booleans carried as strings are read as
/// such when the attribute says so.
pub fn canonical(spec: &AttributeSpec, value: &AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::String(s) if s.is_empty() => AttributeValue::Absent,
        AttributeValue::StringSet(s) if s.is_empty() => AttributeValue::Absent,
        AttributeValue::String(s) => match spec.kind {
            AttributeKind::Integer => s
                .trim()
                .parse()
                .map(AttributeValue::Integer)
                .unwrap_or_else(|_| value.clone()),
            AttributeKind::Boolean => match s.trim() {
                "true" => AttributeValue::Boolean(true),
                "false" => AttributeValue::Boolean(false),
                _ => value.clone(),
            },
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// [`canonical`], then check the value fits the attribute's kind and, for
/// enumerations, that every string is one of the known values.
pub fn normalize(spec: &AttributeSpec, value: &AttributeValue) -> Result<AttributeValue, EngineError> {
    let value = canonical(spec, value);
    let fits = match (&value, spec.kind) {
        (AttributeValue::Absent, _) => true,
        (AttributeValue::String(_), kind) => kind.is_textual(),
        (AttributeValue::StringSet(_), kind) => kind.is_set(),
        (AttributeValue::Integer(_), AttributeKind::Integer) => true,
        (AttributeValue::Boolean(_), AttributeKind::Boolean) => true,
        _ => false,
    };
    if !fits {
        return Err(EngineError::InvalidAttributeType {
            attribute: spec.name.to_string(),
            expected: spec.kind.name(),
            found: value.shape(),
        });
    }
    if let Some(allowed) = spec.kind.allowed_values() {
        let strings: Vec<&str> = match &value {
            AttributeValue::String(s) => vec![s.as_str()],
            AttributeValue::StringSet(set) => set.iter().map(String::as_str).collect(),
            _ => vec![],
        };
        if let Some(bad) = strings.into_iter().find(|s| !allowed.contains(s)) {
            return Err(EngineError::InvalidEnumValue {
                attribute: spec.name.to_string(),
                value: bad.to_string(),
                allowed,
            });
        }
    }
    Ok(value)
}

pub fn equal(spec: &AttributeSpec, a: &AttributeValue, b: &AttributeValue) -> bool {
    let a = canonical(spec, a);
    let b = canonical(spec, b);
    match (&a, &b, spec.kind) {
        (AttributeValue::String(x), AttributeValue::String(y), AttributeKind::Measure) => {
            measure_eq(x, y)
        }
        _ => a == b,
    }
}

/// The remote store answered with a different spelling of the value that
/// was sent, e.g. `"1 m"` for `"60 s"`. Worth a warning, never a diff.
pub fn format_mismatch(spec: &AttributeSpec, expected: &AttributeValue, returned: &AttributeValue) -> bool {
    if spec.kind != AttributeKind::Measure {
        return false;
    }
    match (canonical(spec, expected), canonical(spec, returned)) {
        (AttributeValue::String(x), AttributeValue::String(y)) => x != y && measure_eq(&x, &y),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Duration,
    Size,
}

const DURATION_UNITS: &[(&[&str], u128)] = &[
    (&["ms", "msec", "millisecond", "milliseconds"], 1),
    (&["s", "sec", "secs", "second", "seconds"], 1_000),
    (&["m", "min", "mins", "minute", "minutes"], 60_000),
    (&["h", "hr", "hour", "hours"], 3_600_000),
    (&["d", "day", "days"], 86_400_000),
    (&["w", "week", "weeks"], 604_800_000),
];

const SIZE_UNITS: &[(&[&str], u128)] = &[
    (&["b", "byte", "bytes"], 1),
    (&["kb", "kilobyte", "kilobytes"], 1 << 10),
    (&["mb", "megabyte", "megabytes"], 1 << 20),
    (&["gb", "gigabyte", "gigabytes"], 1 << 30),
    (&["tb", "terabyte", "terabytes"], 1 << 40),
];

/// `"10 mb"` -> `(Size, 10485760)`
fn parse_measure(s: &str) -> Option<(Dimension, u128)> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = s.split_at(split);
    let amount: u128 = amount.parse().ok()?;
    let unit = unit.trim().to_ascii_lowercase();
    let lookup = |table: &[(&[&str], u128)]| {
        table
            .iter()
            .find(|(names, _)| names.contains(&unit.as_str()))
            .map(|(_, factor)| amount.checked_mul(*factor))
    };
    if let Some(ms) = lookup(DURATION_UNITS) {
        return ms.map(|ms| (Dimension::Duration, ms));
    }
    lookup(SIZE_UNITS).flatten().map(|b| (Dimension::Size, b))
}

fn measure_eq(a: &str, b: &str) -> bool {
    match (parse_measure(a), parse_measure(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

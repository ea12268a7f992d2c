//! Dynamic cell values.
//!
//! Source relations are read with `SELECT *`, so column types are only known
//! at runtime. Every cell is a [`Value`]; the transform asks for the typed
//! view it needs (decimal, integer, date) and fails loudly when a cell cannot
//! provide it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::fmt;
use std::str::FromStr;

/// A single cell of a [`Dataset`](crate::dataset::Dataset).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Normalized join key.
///
/// `1`, `1.0` and `Decimal(1)` all map to `Key::Int(1)` so that joins do not
/// depend on how each driver reported a numeric column. Text is compared
/// verbatim: `"007"` never matches `7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i128),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Join key for this value. Nulls never match anything.
    pub fn key(&self) -> Option<Key> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(Key::Int(*b as i128)),
            Value::Int(i) => Some(Key::Int(*i as i128)),
            Value::UInt(u) => Some(Key::Int(*u as i128)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e18 => Some(Key::Int(*f as i128)),
            Value::Float(f) => Some(Key::Text(f.to_string())),
            Value::Decimal(d) => Some(decimal_key(*d)),
            Value::Text(s) => Some(Key::Text(s.clone())),
            Value::Date(d) => Some(Key::Text(d.to_string())),
            Value::DateTime(dt) => Some(Key::Text(dt.to_string())),
        }
    }

    /// Exact decimal view of a numeric cell. `None` for nulls.
    pub fn as_decimal(&self) -> Result<Option<Decimal>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(Decimal::from(*i))),
            Value::UInt(u) => Ok(Some(Decimal::from(*u))),
            Value::Decimal(d) => Ok(Some(*d)),
            Value::Float(f) if f.is_nan() => Ok(None),
            // Shortest round-trip text first, so 49.995 stays 49.995.
            Value::Float(f) => Decimal::from_str(&f.to_string())
                .ok()
                .or_else(|| Decimal::from_f64(*f))
                .map(Some)
                .ok_or_else(|| format!("{} is out of decimal range", f)),
            Value::Text(s) => Decimal::from_str(s.trim())
                .map(Some)
                .map_err(|_| format!("'{}' is not a number", s)),
            other => Err(format!("{} is not a number", other)),
        }
    }

    /// Integer view of a numeric cell. Fractional values are rejected.
    pub fn as_i64(&self) -> Result<Option<i64>, String> {
        match self {
            Value::Int(i) => Ok(Some(*i)),
            Value::UInt(u) => i64::try_from(*u)
                .map(Some)
                .map_err(|_| format!("{} overflows i64", u)),
            other => match other.as_decimal()? {
                None => Ok(None),
                Some(d) if d.fract().is_zero() => d
                    .to_i64()
                    .map(Some)
                    .ok_or_else(|| format!("{} overflows i64", d)),
                Some(d) => Err(format!("{} is not an integer", d)),
            },
        }
    }

    /// Calendar day of a date/timestamp cell, without timezone conversion.
    pub fn as_date(&self) -> Result<Option<NaiveDate>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Date(d) => Ok(Some(*d)),
            Value::DateTime(dt) => Ok(Some(dt.date())),
            Value::Text(s) => parse_date(s.trim()).map(Some),
            other => Err(format!("{} is not a date", other)),
        }
    }

    /// Text used for the dimension columns of the summary.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn decimal_key(d: Decimal) -> Key {
    let d = d.normalize();
    if d.fract().is_zero() {
        if let Some(i) = d.to_i128() {
            return Key::Int(i);
        }
    }
    Key::Text(d.to_string())
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    // Offset-qualified timestamps keep the date as written.
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local().date());
    }
    Err(format!("'{}' is not a recognizable timestamp", s))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

// Single-precision columns go through their shortest text form, so a
// FLOAT 49.995 stays 49.995 instead of 49.994998931884766.
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Decimal::from_str(&v.to_string())
            .map(Value::Decimal)
            .unwrap_or(Value::Float(v as f64))
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_keys_normalize_numeric_types() {
        let expected = Some(Key::Int(7));
        assert_eq!(Value::Int(7).key(), expected);
        assert_eq!(Value::UInt(7).key(), expected);
        assert_eq!(Value::Float(7.0).key(), expected);
        assert_eq!(Value::Decimal(dec("7.00")).key(), expected);
        assert_eq!(Value::Null.key(), None);
        assert_eq!(Value::Text("abc".into()).key(), Some(Key::Text("abc".into())));
    }

    #[test]
    fn test_text_keys_compare_verbatim() {
        assert_eq!(Value::Text("7".into()).key(), Some(Key::Text("7".into())));
        assert_ne!(Value::Text("007".into()).key(), Value::Int(7).key());
        assert_ne!(Value::Text("007".into()).key(), Value::Text("7".into()).key());
    }

    #[test]
    fn test_f32_keeps_shortest_decimal() {
        let price = Value::from(49.995f32);
        assert_eq!(price, Value::Decimal(dec("49.995")));

        let total = Value::from(30.0f32).as_decimal().unwrap().unwrap()
            + price.as_decimal().unwrap().unwrap();
        assert_eq!(crate::transform::round_money(total), dec("80.00"));
        assert!(matches!(Value::from(f32::NAN), Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_as_decimal() {
        assert_eq!(Value::Float(49.995).as_decimal().unwrap(), Some(dec("49.995")));
        assert_eq!(Value::Int(30).as_decimal().unwrap(), Some(dec("30")));
        assert_eq!(Value::Text(" 12.50 ".into()).as_decimal().unwrap(), Some(dec("12.50")));
        assert_eq!(Value::Null.as_decimal().unwrap(), None);
        assert!(Value::Text("n/a".into()).as_decimal().is_err());
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Float(3.0).as_i64().unwrap(), Some(3));
        assert_eq!(Value::Decimal(dec("5.00")).as_i64().unwrap(), Some(5));
        assert!(Value::Float(2.5).as_i64().is_err());
        assert!(Value::UInt(u64::MAX).as_i64().is_err());
    }

    #[test]
    fn test_as_date_truncates_without_timezone_shift() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let cases = [
            "2024-03-01 23:59:59",
            "2024-03-01T00:00:00",
            "2024-03-01 10:15:00.250",
            "2024-03-01",
            "2024-03-01T23:30:00-05:00",
        ];
        for case in cases {
            assert_eq!(Value::Text(case.into()).as_date().unwrap(), Some(day), "{}", case);
        }
        let dt = day.and_hms_opt(23, 59, 0).unwrap();
        assert_eq!(Value::DateTime(dt).as_date().unwrap(), Some(day));
        assert!(Value::Text("yesterday".into()).as_date().is_err());
        assert!(Value::Int(20240301).as_date().is_err());
    }
}

//! Scalar values carried in record fields, line rows and query results.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use rkyv::{Archive, Deserialize, Serialize};
use serde::de::Error as _;
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Date format used when dates travel as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A scalar value that can be serialized over the wire.
///
/// The record schema is owned by the server, so the client never checks
/// that a value fits the field it is assigned to.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Calendar date as days since 0001-01-01 (day 1).
    Date(i32),
}

impl Value {
    /// Build a date value.
    pub fn date(date: NaiveDate) -> Self {
        Value::Date(date.num_days_from_ce())
    }

    /// Parse a `YYYY-MM-DD` string into a date value.
    pub fn parse_date(text: &str) -> Option<Self> {
        NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .ok()
            .map(Value::date)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            Value::Int64(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a calendar date. Strings in `YYYY-MM-DD` form qualify.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(days) => NaiveDate::from_num_days_from_ce_opt(*days),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Order two values the way the server compares them in queries.
    ///
    /// Integers and floats compare numerically, dates compare against dates
    /// or date-shaped strings. Null only equals null. Returns `None` when
    /// the two values are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(_), _) | (_, Value::Date(_)) => {
                let (a, b) = (self.as_date()?, other.as_date()?);
                Some(a.cmp(&b))
            }
            (Value::Float64(_), _) | (_, Value::Float64(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => Some(self.as_i64()?.cmp(&other.as_i64()?)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Date(_) => match self.as_date() {
                Some(date) => write!(f, "{}", date.format(DATE_FORMAT)),
                None => f.write_str("<invalid date>"),
            },
        }
    }
}

impl SerdeSerialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int32(i) => serializer.serialize_i32(*i),
            Value::Int64(i) => serializer.serialize_i64(*i),
            Value::Float64(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> SerdeDeserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::try_from(json).map_err(D::Error::custom)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = String;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(i32::try_from(i).map(Value::Int32).unwrap_or(Value::Int64(i)))
                } else {
                    n.as_f64()
                        .map(Value::Float64)
                        .ok_or_else(|| format!("unsupported number {}", n))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s)),
            other => Err(format!("expected a scalar value, got {}", other)),
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

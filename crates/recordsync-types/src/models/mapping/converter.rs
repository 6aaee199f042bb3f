use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::str::FromStr;

use crate::error::{ConfigError, ConversionError};

/// Remote systems commonly emit `2024-01-02T03:04:05.000+0000`, which is not
/// strict RFC 3339 (no colon in the offset).
const COMPACT_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value-level coercion applied to a field while it is translated.
///
/// `null` passes through every converter unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Converter {
    #[default]
    Identity,
    String,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 UTC with millisecond precision
    Timestamp,
    /// `YYYY-MM-DD`
    Date,
}

impl Converter {
    pub fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
        }
    }

    /// Coerce `value` for `field`, failing instead of guessing.
    pub fn apply(self, field: &str, value: Value) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(value);
        }
        let fail = |message: String| ConversionError::new(field, self.name(), message);

        match self {
            Self::Identity => Ok(value),
            Self::String => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(fail(format!("unsupported value {other}"))),
            },
            Self::Integer => to_integer(&value).map(Value::from).ok_or_else(|| {
                fail(format!("{value} is not an integer"))
            }),
            Self::Float => value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| fail(format!("{value} is not a finite number"))),
            Self::Boolean => to_boolean(&value)
                .map(Value::Bool)
                .ok_or_else(|| fail(format!("{value} is not a boolean"))),
            Self::Timestamp => to_timestamp(&value)
                .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)))
                .ok_or_else(|| fail(format!("{value} is not a timestamp"))),
            Self::Date => to_date(&value)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .ok_or_else(|| fail(format!("{value} is not a date"))),
        }
    }
}

impl FromStr for Converter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" | "" => Ok(Self::Identity),
            "string" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" | "double" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "date" => Ok(Self::Date),
            _ => Err(ConfigError::UnknownConverter { name: s.to_string() }),
        }
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Strings in RFC 3339 or compact-offset form; integers as epoch milliseconds.
pub fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Parse an RFC 3339 or compact-offset timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, COMPACT_OFFSET_FORMAT))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn to_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date_naive()))
}

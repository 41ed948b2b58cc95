//! Raw records as returned by a fetcher, and the typed coercions applied at
//! the ingestion boundary.
//!
//! Coercion failures are never skipped row-by-row: the first bad field aborts
//! the query with a [`RefDataError::MalformedRecord`] or
//! [`RefDataError::TypeCoercion`] naming the view, row and field.

use super::date::TradingDate;
use super::ids::EntityId;
use crate::error::{RefDataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A primitive cell value of a raw row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Null or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
        }
    }

    /// Infer a typed value from a text cell (CSV sources).
    ///
    /// Integers with a leading zero (`000300`) stay text so instrument codes
    /// keep their padding.
    pub fn infer(raw: &str) -> FieldValue {
        let s = raw.trim();
        if s.is_empty() {
            return FieldValue::Null;
        }
        let unsigned = s.strip_prefix('-').unwrap_or(s);
        let leading_zero = unsigned.len() > 1 && unsigned.starts_with('0') && !unsigned.starts_with("0.");
        if !leading_zero {
            if unsigned.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(i) = s.parse::<i64>() {
                    return FieldValue::Int(i);
                }
            }
            if unsigned.bytes().any(|b| b == b'.' || b == b'e' || b == b'E')
                && unsigned.bytes().next().is_some_and(|b| b.is_ascii_digit())
            {
                if let Ok(f) = s.parse::<f64>() {
                    return FieldValue::Float(f);
                }
            }
        }
        FieldValue::Text(s.to_string())
    }

    /// Integer view of a numeric-looking value, if it has one.
    fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

static NULL: FieldValue = FieldValue::Null;

/// One flat row: field name → value, in upstream column order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record(Vec<(String, FieldValue)>);

impl Record {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn insert(&mut self, name: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Field value, with absent fields reading as null.
    pub fn value(&self, name: &str) -> &FieldValue {
        self.get(name).unwrap_or(&NULL)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the named fields, in the order given.
    pub fn project(&self, fields: &[String]) -> Record {
        Record(
            fields
                .iter()
                .filter_map(|f| self.get(f).map(|v| (f.clone(), v.clone())))
                .collect(),
        )
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(&name, value);
        }
        record
    }
}

/// Where a value came from, for error messages.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub view: &'a str,
    pub row: usize,
}

impl<'a> RowContext<'a> {
    pub fn new(view: &'a str, row: usize) -> Self {
        Self { view, row }
    }

    fn malformed(&self, field: &str, value: &FieldValue) -> RefDataError {
        RefDataError::MalformedRecord {
            view: self.view.to_string(),
            row: self.row,
            field: field.to_string(),
            value: render(value),
        }
    }

    fn coercion(&self, field: &str, expected: &'static str, value: &FieldValue) -> RefDataError {
        RefDataError::TypeCoercion {
            view: self.view.to_string(),
            row: self.row,
            field: field.to_string(),
            expected,
            value: render(value),
        }
    }

    /// A required date field (`YYYYMMDD` integer or ISO text).
    pub fn date(&self, record: &Record, field: &str) -> Result<TradingDate> {
        let value = record.value(field);
        let parsed = match value {
            FieldValue::Text(s) => s.parse::<TradingDate>().ok(),
            other => other.as_integer().and_then(|i| TradingDate::from_int(i).ok()),
        };
        parsed.ok_or_else(|| self.malformed(field, value))
    }

    /// An optional date field; blank reads as `None`.
    pub fn optional_date(&self, record: &Record, field: &str) -> Result<Option<TradingDate>> {
        if record.value(field).is_blank() {
            return Ok(None);
        }
        self.date(record, field).map(Some)
    }

    /// An interval bound: blank is the open-ended sentinel, numeric-looking
    /// values parse as dates, anything else is a type error.
    pub fn interval_bound(&self, record: &Record, field: &str) -> Result<TradingDate> {
        let value = record.value(field);
        if value.is_blank() {
            return Ok(TradingDate::OPEN_END);
        }
        match value {
            FieldValue::Text(s) if s.trim().contains('-') => s
                .parse::<TradingDate>()
                .map_err(|_| self.coercion(field, "date", value)),
            FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Text(_) => {
                let i = value
                    .as_integer()
                    .ok_or_else(|| self.coercion(field, "date", value))?;
                TradingDate::from_int(i).map_err(|_| self.malformed(field, value))
            }
            _ => Err(self.coercion(field, "date", value)),
        }
    }

    /// A required finite floating point value.
    pub fn float(&self, record: &Record, field: &str) -> Result<f64> {
        let value = record.value(field);
        let parsed = match value {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(x) => Some(*x),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|x| x.is_finite())
            .ok_or_else(|| self.coercion(field, "float", value))
    }

    /// A required integer value.
    pub fn integer(&self, record: &Record, field: &str) -> Result<i64> {
        let value = record.value(field);
        match value {
            FieldValue::Bool(_) | FieldValue::Null => Err(self.coercion(field, "int", value)),
            other => other
                .as_integer()
                .ok_or_else(|| self.coercion(field, "int", value)),
        }
    }

    /// A required entity id. Integers are accepted and rendered as text.
    pub fn entity(&self, record: &Record, field: &str) -> Result<EntityId> {
        let value = record.value(field);
        match value {
            FieldValue::Text(s) if !s.trim().is_empty() => Ok(EntityId::from(s.trim())),
            FieldValue::Int(i) => Ok(EntityId::new(i.to_string())),
            _ => Err(self.malformed(field, value)),
        }
    }

    /// A categorical code in canonical text form. Blank reads as `None`.
    ///
    /// Integral floats render without a fractional part so `110000.0` and
    /// `110000` produce the same code.
    pub fn category(&self, record: &Record, field: &str) -> Result<Option<String>> {
        let value = record.value(field);
        match value {
            v if v.is_blank() => Ok(None),
            FieldValue::Text(s) => Ok(Some(s.trim().to_string())),
            FieldValue::Int(i) => Ok(Some(i.to_string())),
            FieldValue::Float(x) if x.is_finite() && x.fract() == 0.0 => Ok(Some(format!("{}", *x as i64))),
            FieldValue::Float(x) if x.is_finite() => Ok(Some(x.to_string())),
            _ => Err(self.coercion(field, "category", value)),
        }
    }
}

fn render(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "<null>".to_string(),
        FieldValue::Text(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

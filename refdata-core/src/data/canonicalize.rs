//! Canonical row handling for thin-delegation results: ordering, exact
//! duplicate removal, and conversion to a polars `DataFrame`.

use crate::domain::{FieldValue, Record};
use crate::error::{RefDataError, Result};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Canonicalizer for fetched rows
pub struct Canonicalizer;

impl Canonicalizer {
    /// Drop exact duplicate rows, keeping the first occurrence in source order.
    pub fn dedup(rows: Vec<Record>) -> Vec<Record> {
        let mut seen = HashSet::new();
        rows.into_iter().filter(|r| seen.insert(row_key(r, None))).collect()
    }

    /// Stable-sort by `by`, then drop rows repeating the same values in those
    /// columns, keeping the first.
    pub fn dedup_on(mut rows: Vec<Record>, by: &[String]) -> Vec<Record> {
        Self::sort(&mut rows, by);
        let mut seen = HashSet::new();
        rows.into_iter()
            .filter(|r| seen.insert(row_key(r, Some(by))))
            .collect()
    }

    /// Stable sort on the given columns, nulls first.
    pub fn sort(rows: &mut [Record], by: &[String]) {
        rows.sort_by(|a, b| {
            by.iter()
                .map(|f| compare_values(a.value(f), b.value(f)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Convert rows to a DataFrame.
    ///
    /// Columns appear in first-seen order. A column whose non-null values are
    /// all integers becomes Int64, integers mixed with floats become Float64,
    /// all-bool becomes Boolean, and anything else is rendered as String.
    pub fn to_frame(rows: &[Record]) -> Result<DataFrame> {
        let mut names: Vec<&str> = Vec::new();
        for row in rows {
            for name in row.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let columns = names
            .iter()
            .map(|name| build_column(name, rows))
            .collect::<Vec<_>>();

        DataFrame::new(columns)
            .map_err(|e| RefDataError::Source(format!("dataframe creation: {e}")))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ColumnKind {
    Empty,
    Int,
    Float,
    Bool,
    Text,
}

fn build_column(name: &str, rows: &[Record]) -> Column {
    let kind = rows
        .iter()
        .map(|r| r.value(name))
        .fold(ColumnKind::Empty, |kind, v| match (kind, v) {
            (k, FieldValue::Null) => k,
            (ColumnKind::Empty | ColumnKind::Int, FieldValue::Int(_)) => ColumnKind::Int,
            (ColumnKind::Empty | ColumnKind::Int | ColumnKind::Float, FieldValue::Int(_) | FieldValue::Float(_)) => {
                ColumnKind::Float
            }
            (ColumnKind::Empty | ColumnKind::Bool, FieldValue::Bool(_)) => ColumnKind::Bool,
            _ => ColumnKind::Text,
        });

    let values = rows.iter().map(|r| r.value(name));
    match kind {
        ColumnKind::Int => Column::new(
            name.into(),
            values
                .map(|v| match v {
                    FieldValue::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<Option<i64>>>(),
        ),
        ColumnKind::Float => Column::new(
            name.into(),
            values
                .map(|v| match v {
                    FieldValue::Int(i) => Some(*i as f64),
                    FieldValue::Float(x) => Some(*x),
                    _ => None,
                })
                .collect::<Vec<Option<f64>>>(),
        ),
        ColumnKind::Bool => Column::new(
            name.into(),
            values
                .map(|v| match v {
                    FieldValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<Option<bool>>>(),
        ),
        ColumnKind::Text | ColumnKind::Empty => Column::new(
            name.into(),
            values
                .map(|v| match v {
                    FieldValue::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<Option<String>>>(),
        ),
    }
}

/// Hashable identity of a row (or of a subset of its columns).
fn row_key(row: &Record, subset: Option<&[String]>) -> String {
    let mut key = String::new();
    let mut push = |name: &str, v: &FieldValue| {
        key.push_str(name);
        key.push('\u{1f}');
        key.push_str(v.type_name());
        key.push(':');
        match v {
            FieldValue::Float(x) => key.push_str(&x.to_bits().to_string()),
            other => key.push_str(&other.to_string()),
        }
        key.push('\u{1e}');
    };
    match subset {
        Some(fields) => fields.iter().for_each(|f| push(f, row.value(f))),
        None => row.iter().for_each(|(n, v)| push(n, v)),
    }
    key
}

/// Ordering for sorting rows: nulls first, numbers numerically, text lexically.
pub(crate) fn compare_values(a: &FieldValue, b: &FieldValue) -> Ordering {
    fn numeric(v: &FieldValue) -> Option<f64> {
        match v {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(x) => Some(*x),
            _ => None,
        }
    }
    match (a, b) {
        (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
        (FieldValue::Null, _) => Ordering::Less,
        (_, FieldValue::Null) => Ordering::Greater,
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(symbol: &str, date: i64, close: f64) -> Record {
        Record::new()
            .with("symbol", symbol)
            .with("trade_date", date)
            .with("close", close)
    }

    #[test]
    fn dedup_removes_exact_duplicates_only() {
        let rows = vec![
            bar("SPY", 20200102, 100.0),
            bar("SPY", 20200102, 100.0),
            bar("SPY", 20200102, 101.0),
        ];
        let deduped = Canonicalizer::dedup(rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[1].value("close"), &FieldValue::Float(101.0));
    }

    #[test]
    fn dedup_on_subset_keeps_first_after_sort() {
        let rows = vec![
            bar("SPY", 20200103, 3.0),
            bar("SPY", 20200102, 1.0),
            bar("SPY", 20200102, 2.0),
        ];
        let deduped = Canonicalizer::dedup_on(rows, &["trade_date".to_string()]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].value("close"), &FieldValue::Float(1.0));
        assert_eq!(deduped[1].value("trade_date"), &FieldValue::Int(20200103));
    }

    #[test]
    fn frame_columns_are_typed() {
        let rows = vec![
            Record::new()
                .with("symbol", "A")
                .with("trade_date", 20200102i64)
                .with("close", 10i64)
                .with("suspended", false),
            Record::new()
                .with("symbol", "B")
                .with("trade_date", 20200102i64)
                .with("close", 10.5)
                .with("suspended", FieldValue::Null),
        ];
        let df = Canonicalizer::to_frame(&rows).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("trade_date").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("close").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("symbol").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("suspended").unwrap().dtype(), &DataType::Boolean);
        let close = df.column("close").unwrap().f64().unwrap();
        assert_eq!(close.get(0), Some(10.0));
    }

    #[test]
    fn empty_rows_give_empty_frame() {
        let df = Canonicalizer::to_frame(&[]).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 0);
    }
}

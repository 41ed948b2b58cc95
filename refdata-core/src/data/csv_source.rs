//! CSV-backed record store.
//!
//! Layout: `{root}/{view}.csv`, one file per view, first row is the header.
//! Cells are type-inferred with [`FieldValue::infer`]. Filters are applied
//! locally so the store answers the same queries the remote service does:
//!
//! - `start_date` / `end_date` bound the view's date field, or for interval
//!   views select rows whose `[in_date, out_date]` span overlaps the range
//! - `trade_date` on as-of views selects the latest snapshot on or before it
//! - `start_time` / `end_time` bound the `time` field when present
//! - any other key matches when the row's field is one of the comma-separated
//!   values; keys naming fields the view does not carry are ignored

use super::canonicalize::compare_values;
use super::provider::{FetchResponse, FetchStatus, RawRecordFetcher};
use super::query::{views, Filter, Query};
use crate::domain::{FieldValue, Record, RowContext, TradingDate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a view's rows relate to dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewLayout {
    /// Field bounded by `start_date` / `end_date`.
    pub date_field: Option<String>,
    /// `(in, out)` fields of an interval view.
    pub interval: Option<(String, String)>,
    /// `trade_date` selects the latest snapshot on or before the given date.
    pub as_of: bool,
}

impl ViewLayout {
    fn dated(field: &str) -> Self {
        Self {
            date_field: Some(field.to_string()),
            ..Self::default()
        }
    }

    fn interval(in_field: &str, out_field: &str) -> Self {
        Self {
            interval: Some((in_field.to_string(), out_field.to_string())),
            ..Self::default()
        }
    }

    /// Layout of the views in the built-in catalogue.
    pub fn builtin(view: &str) -> Self {
        match view {
            views::DAILY | views::BAR | views::TICK => Self::dated("trade_date"),
            views::SEC_ADJ_FACTOR | views::SEC_DAILY_INDICATOR => Self::dated("trade_date"),
            views::INCOME | views::CASH_FLOW | views::BALANCE_SHEET | views::FIN_INDICATOR => {
                Self::dated("ann_date")
            }
            views::INDEX_WEIGHT => Self {
                as_of: true,
                ..Self::dated("trade_date")
            },
            views::INDEX_CONS | views::SEC_INDUSTRY => Self::interval("in_date", "out_date"),
            _ => Self::default(),
        }
    }
}

/// Record fetcher reading one CSV file per view.
pub struct CsvRecordFetcher {
    name: String,
    root: PathBuf,
    layouts: HashMap<String, ViewLayout>,
}

impl CsvRecordFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: format!("csv:{}", root.display()),
            root,
            layouts: HashMap::new(),
        }
    }

    /// Override the date layout of one view.
    pub fn with_layout(mut self, view: &str, layout: ViewLayout) -> Self {
        self.layouts.insert(view.to_string(), layout);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn view_path(&self, view: &str) -> PathBuf {
        self.root.join(format!("{view}.csv"))
    }

    fn layout(&self, view: &str) -> ViewLayout {
        self.layouts
            .get(view)
            .cloned()
            .unwrap_or_else(|| ViewLayout::builtin(view))
    }

    fn read_view(&self, view: &str) -> Result<Vec<Record>, FetchStatus> {
        let path = self.view_path(view);
        if !path.exists() {
            return Err(FetchStatus::error("-1", format!("unknown view '{view}'")));
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| FetchStatus::error("-1", format!("open {}: {e}", path.display())))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| FetchStatus::error("-1", format!("header of {view}: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| FetchStatus::error("-1", format!("{view} row {}: {e}", i + 1)))?;
            rows.push(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, cell)| (h.clone(), FieldValue::infer(cell)))
                    .collect(),
            );
        }
        Ok(rows)
    }
}

impl RawRecordFetcher for CsvRecordFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, query: &Query) -> FetchResponse {
        let rows = match self.read_view(&query.view) {
            Ok(rows) => rows,
            Err(status) => return FetchResponse::failed(status),
        };
        let layout = self.layout(&query.view);

        let mut selected = match select_rows(&query.view, rows, &query.filter, &layout) {
            Ok(rows) => rows,
            Err(status) => return FetchResponse::failed(status),
        };

        if let Some(order) = &query.order_by {
            selected.sort_by(|a, b| compare_values(a.value(order), b.value(order)));
        }
        if !query.fields.is_all() {
            selected = selected
                .iter()
                .map(|r| r.project(query.fields.names()))
                .collect();
        }

        debug!(view = %query.view, rows = selected.len(), "csv fetch");
        FetchResponse::ok(selected)
    }
}

fn select_rows(
    view: &str,
    rows: Vec<Record>,
    filter: &Filter,
    layout: &ViewLayout,
) -> Result<Vec<Record>, FetchStatus> {
    let bad_filter =
        |key: &str, value: &str| FetchStatus::error("-1", format!("bad filter {key}={value}"));
    let parse_date =
        |key: &str, value: &str| value.parse::<TradingDate>().map_err(|_| bad_filter(key, value));

    let mut kept = Vec::new();
    let mut as_of: Option<TradingDate> = None;

    'rows: for (i, row) in rows.into_iter().enumerate() {
        let ctx = RowContext::new(view, i);
        for (key, value) in filter.iter() {
            if value.trim().is_empty() {
                continue;
            }
            let keep = match key {
                "start_date" | "end_date" => {
                    let bound = parse_date(key, value)?;
                    match (&layout.interval, &layout.date_field) {
                        (Some((in_f, out_f)), _) => {
                            let in_date = ctx
                                .interval_bound(&row, in_f)
                                .map_err(|e| FetchStatus::error("-1", e.to_string()))?;
                            let out_date = ctx
                                .interval_bound(&row, out_f)
                                .map_err(|e| FetchStatus::error("-1", e.to_string()))?;
                            if key == "start_date" {
                                out_date >= bound
                            } else {
                                in_date <= bound
                            }
                        }
                        (None, Some(field)) => {
                            let date = ctx
                                .date(&row, field)
                                .map_err(|e| FetchStatus::error("-1", e.to_string()))?;
                            if key == "start_date" {
                                date >= bound
                            } else {
                                date <= bound
                            }
                        }
                        (None, None) => true,
                    }
                }
                "trade_date" if layout.as_of => {
                    let bound = parse_date(key, value)?;
                    as_of = Some(bound);
                    let field = layout.date_field.as_deref().unwrap_or("trade_date");
                    let date = ctx
                        .date(&row, field)
                        .map_err(|e| FetchStatus::error("-1", e.to_string()))?;
                    date <= bound
                }
                "start_time" | "end_time" if row.contains("time") => {
                    let bound: i64 = value
                        .trim()
                        .parse()
                        .map_err(|_| bad_filter(key, value))?;
                    let time = ctx
                        .integer(&row, "time")
                        .map_err(|e| FetchStatus::error("-1", e.to_string()))?;
                    if key == "start_time" {
                        time >= bound
                    } else {
                        time <= bound
                    }
                }
                field => match row.get(field) {
                    Some(cell) => {
                        let cell = cell.to_string();
                        value.split(',').any(|v| v.trim() == cell.trim())
                    }
                    None => true,
                },
            };
            if !keep {
                continue 'rows;
            }
        }
        kept.push(row);
    }

    if as_of.is_some() {
        let field = layout.date_field.as_deref().unwrap_or("trade_date");
        let latest = kept
            .iter()
            .filter_map(|r| r.get(field).map(|v| v.to_string()))
            .filter_map(|s| s.parse::<TradingDate>().ok())
            .max();
        kept.retain(|r| {
            r.get(field)
                .and_then(|v| v.to_string().parse::<TradingDate>().ok())
                == latest
        });
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::query::FieldList;
    use std::fs;

    fn store(files: &[(&str, &str)]) -> (tempfile::TempDir, CsvRecordFetcher) {
        let dir = tempfile::tempdir().unwrap();
        for (view, body) in files {
            fs::write(dir.path().join(format!("{view}.csv")), body).unwrap();
        }
        let fetcher = CsvRecordFetcher::new(dir.path());
        (dir, fetcher)
    }

    #[test]
    fn unknown_view_is_an_error_status() {
        let (_dir, fetcher) = store(&[]);
        let resp = fetcher.fetch(&Query::new("lb.nothing"));
        assert!(!resp.status.is_ok());
        assert!(resp.rows.is_empty());
    }

    #[test]
    fn name_identifies_the_store() {
        let (dir, fetcher) = store(&[]);
        let other = tempfile::tempdir().unwrap();
        assert_eq!(fetcher.name(), format!("csv:{}", dir.path().display()));
        assert_ne!(fetcher.name(), CsvRecordFetcher::new(other.path()).name());
    }

    #[test]
    fn interval_view_selects_overlapping_spans() {
        let (_dir, fetcher) = store(&[(
            views::INDEX_CONS,
            "index_code,symbol,in_date,out_date\n\
             399300.SZ,A,20190101,20190601\n\
             399300.SZ,B,20190101,\n\
             399300.SZ,C,20200301,\n\
             000905.SH,D,20190101,\n",
        )]);
        let query = Query::new(views::INDEX_CONS).filter(
            Filter::new()
                .set("index_code", "399300.SZ")
                .set("start_date", 20200101)
                .set("end_date", 20200201),
        );
        let resp = fetcher.fetch(&query);
        assert!(resp.status.is_ok());
        let symbols: Vec<String> = resp.rows.iter().map(|r| r.value("symbol").to_string()).collect();
        assert_eq!(symbols, vec!["B"]);
    }

    #[test]
    fn as_of_view_returns_latest_snapshot() {
        let (_dir, fetcher) = store(&[(
            views::INDEX_WEIGHT,
            "index_code,symbol,trade_date,weight\n\
             399300.SZ,A,20200102,0.6\n\
             399300.SZ,B,20200102,0.4\n\
             399300.SZ,A,20200203,1.0\n",
        )]);
        let query = Query::new(views::INDEX_WEIGHT).filter(
            Filter::new()
                .set("index_code", "399300.SZ")
                .set("trade_date", 20200115),
        );
        let resp = fetcher.fetch(&query);
        assert_eq!(resp.rows.len(), 2);
        assert!(resp.rows.iter().all(|r| r.value("trade_date") == &FieldValue::Int(20200102)));
    }

    #[test]
    fn symbol_lists_order_and_projection() {
        let (_dir, fetcher) = store(&[(
            views::SEC_ADJ_FACTOR,
            "symbol,trade_date,adjust_factor\n\
             B,20200103,1.0\n\
             A,20200102,2.0\n\
             C,20200102,3.0\n",
        )]);
        let query = Query::new(views::SEC_ADJ_FACTOR)
            .filter(Filter::new().set("symbol", "A,B").set("start_date", "").set("end_date", ""))
            .fields(FieldList::of(&["symbol", "adjust_factor"]))
            .order_by("symbol");
        let resp = fetcher.fetch(&query);
        assert_eq!(resp.rows.len(), 2);
        assert_eq!(resp.rows[0].value("symbol"), &FieldValue::Text("A".into()));
        assert_eq!(resp.rows[0].names().collect::<Vec<_>>(), vec!["symbol", "adjust_factor"]);
    }
}

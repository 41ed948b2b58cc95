//! Query service: thin delegations to the record fetcher and the four
//! point-in-time panel builders.
//!
//! A [`DataService`] is constructed explicitly from a fetcher, a calendar and
//! a [`ServiceConfig`]; there is no process-wide client. Every query takes
//! `&self` and the service holds no mutable state, so one instance can be
//! shared across threads when its collaborators allow it.

mod adjust;
mod index;
mod industry;
mod market;
mod reference;

pub use market::{AdjustMode, BarFreq, IntradayRequest};
pub use reference::FinStatKind;

use crate::config::ServiceConfig;
use crate::data::{CalendarProvider, FetchStatus, Query, RawRecordFetcher};
use crate::domain::{Record, RowContext, TradingDate};
use crate::error::{RefDataError, Result};
use crate::panel::{DensePanel, PanelCache, PanelKey, PanelValue};
use tracing::{info, warn};

/// A query result plus the diagnostics a caller must check.
#[derive(Debug)]
pub struct QueryOutcome<T> {
    pub data: T,
    /// Status propagated from the fetch layer.
    pub status: FetchStatus,
    /// Non-fatal condition, currently only an empty universe.
    pub warning: Option<RefDataError>,
}

impl<T> QueryOutcome<T> {
    pub fn new(data: T, status: FetchStatus) -> Self {
        Self {
            data,
            status,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: RefDataError) -> Self {
        self.warning = Some(warning);
        self
    }

    /// `code,message`: `"0,"` on a clean success, the warning text appended
    /// after the code when one is attached.
    pub fn message(&self) -> String {
        match &self.warning {
            Some(w) => format!("{},{w}", self.status.code),
            None => self.status.to_string(),
        }
    }

    pub fn is_empty_universe(&self) -> bool {
        self.warning
            .as_ref()
            .is_some_and(RefDataError::is_empty_universe)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryOutcome<U> {
        QueryOutcome {
            data: f(self.data),
            status: self.status,
            warning: self.warning,
        }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

pub struct DataService<F, C> {
    fetcher: F,
    calendar: C,
    config: ServiceConfig,
    cache: Option<PanelCache>,
}

impl<F: RawRecordFetcher, C: CalendarProvider> DataService<F, C> {
    pub fn new(fetcher: F, calendar: C) -> Self {
        Self {
            fetcher,
            calendar,
            config: ServiceConfig::default(),
            cache: None,
        }
    }

    /// Replace the configuration. A configured cache directory enables the
    /// panel cache.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        if let Some(dir) = &config.cache_dir {
            self.cache = Some(PanelCache::new(dir));
        }
        self.config = config;
        self
    }

    pub fn with_cache(mut self, cache: PanelCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn cache(&self) -> Option<&PanelCache> {
        self.cache.as_ref()
    }

    /// Run one query; a non-success status becomes an upstream error.
    pub(crate) fn fetch(&self, query: &Query) -> Result<(Vec<Record>, FetchStatus)> {
        info!(source = self.fetcher.name(), query = %query, "fetch");
        let (rows, status) = self.fetcher.fetch(query).into_rows()?;
        info!(view = %query.view, rows = rows.len(), "fetched");
        Ok((rows, status))
    }

    pub(crate) fn trading_dates(&self, start: TradingDate, end: TradingDate) -> Result<Vec<TradingDate>> {
        self.calendar.trading_dates(start, end)
    }

    /// Serve a panel from the cache, or build and store it.
    ///
    /// Outcomes carrying a warning are never stored.
    pub(crate) fn cached_panel<T, B>(&self, key: PanelKey, build: B) -> Result<QueryOutcome<DensePanel<T>>>
    where
        T: PanelValue,
        B: FnOnce() -> Result<QueryOutcome<DensePanel<T>>>,
    {
        let Some(cache) = &self.cache else {
            return build();
        };
        if let Some(panel) = cache.load::<T>(&key)? {
            let status = cache.get_meta(&key).map(|meta| meta.status).unwrap_or_default();
            info!(operation = %key.operation, %status, "served from cache");
            return Ok(QueryOutcome::new(panel, status));
        }
        let outcome = build()?;
        if outcome.warning.is_none() {
            if let Err(e) = cache.write(&key, &outcome.data, &outcome.status) {
                warn!(operation = %key.operation, error = %e, "failed to cache panel");
            }
        }
        Ok(outcome)
    }
}

/// Zero-column panel over `dates`, flagged as an empty universe.
pub(crate) fn empty_panel<T: Clone>(
    view: &str,
    dates: Vec<TradingDate>,
    status: FetchStatus,
) -> Result<QueryOutcome<DensePanel<T>>> {
    warn!(view, dates = dates.len(), "empty universe");
    let panel = DensePanel::new_unfilled(dates, Vec::new())?;
    Ok(QueryOutcome::new(panel, status).with_warning(RefDataError::EmptyUniverse {
        view: view.to_string(),
    }))
}

/// Rewrite the named fields of every row as integers. Absent and blank
/// cells are left as they are.
pub(crate) fn coerce_int_fields(view: &str, rows: &mut [Record], fields: &[&str]) -> Result<()> {
    for (i, row) in rows.iter_mut().enumerate() {
        let ctx = RowContext::new(view, i);
        for field in fields {
            if row.value(field).is_blank() {
                continue;
            }
            let v = ctx.integer(row, field)?;
            row.insert(field, v);
        }
    }
    Ok(())
}

/// Rewrite the named fields of every row as finite floats. Absent and blank
/// cells are left as they are.
pub(crate) fn coerce_float_fields(view: &str, rows: &mut [Record], fields: &[&str]) -> Result<()> {
    for (i, row) in rows.iter_mut().enumerate() {
        let ctx = RowContext::new(view, i);
        for field in fields {
            if row.value(field).is_blank() {
                continue;
            }
            let v = ctx.float(row, field)?;
            row.insert(field, v);
        }
    }
    Ok(())
}

/// Rewrite the named date fields of every row as `YYYYMMDD` integers.
pub(crate) fn coerce_date_fields(view: &str, rows: &mut [Record], fields: &[&str]) -> Result<()> {
    for (i, row) in rows.iter_mut().enumerate() {
        let ctx = RowContext::new(view, i);
        for field in fields {
            if let Some(date) = ctx.optional_date(row, field)? {
                row.insert(field, date.as_i32());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;

    #[test]
    fn message_reports_status_and_warning() {
        let ok = QueryOutcome::new((), FetchStatus::ok());
        assert_eq!(ok.message(), "0,");
        let warned = QueryOutcome::new((), FetchStatus::ok()).with_warning(RefDataError::EmptyUniverse {
            view: "lb.indexCons".into(),
        });
        assert!(warned.is_empty_universe());
        assert_eq!(warned.message(), "0,empty universe: 'lb.indexCons' returned no rows");
    }

    #[test]
    fn int_coercion_rewrites_numeric_text() {
        let mut rows = vec![Record::new()
            .with("ann_date", "20200110")
            .with("report_date", 20191231.0)
            .with("other", "x")];
        coerce_int_fields("lb.income", &mut rows, &["ann_date", "report_date", "missing"]).unwrap();
        assert_eq!(rows[0].value("ann_date"), &FieldValue::Int(20200110));
        assert_eq!(rows[0].value("report_date"), &FieldValue::Int(20191231));
        assert!(!rows[0].contains("missing"));
    }

    #[test]
    fn float_coercion_rejects_text() {
        let mut rows = vec![Record::new().with("weight", "heavy")];
        let err = coerce_float_fields("lb.indexWeight", &mut rows, &["weight"]).unwrap_err();
        assert!(matches!(err, RefDataError::TypeCoercion { .. }));
    }

    #[test]
    fn date_coercion_normalizes_iso() {
        let mut rows = vec![Record::new().with("trade_date", "2020-01-03")];
        coerce_date_fields("lb.secAdjFactor", &mut rows, &["trade_date"]).unwrap();
        assert_eq!(rows[0].value("trade_date"), &FieldValue::Int(20200103));
    }
}

//! Financial statements, daily indicators and instrument information.

use super::{coerce_int_fields, DataService, QueryOutcome};
use crate::data::{views, CalendarProvider, Canonicalizer, FieldList, Filter, Query, RawRecordFetcher};
use crate::domain::{SymbolList, TradingDate};
use crate::error::{RefDataError, Result};
use polars::prelude::DataFrame;
use std::fmt;
use std::str::FromStr;

/// Financial statement family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinStatKind {
    Income,
    CashFlow,
    BalanceSheet,
    FinIndicator,
}

impl FinStatKind {
    pub fn view(self) -> &'static str {
        match self {
            FinStatKind::Income => views::INCOME,
            FinStatKind::CashFlow => views::CASH_FLOW,
            FinStatKind::BalanceSheet => views::BALANCE_SHEET,
            FinStatKind::FinIndicator => views::FIN_INDICATOR,
        }
    }

    /// Statements are filtered to the consolidated report type; the
    /// indicator view has no such column.
    fn uses_report_type(self) -> bool {
        !matches!(self, FinStatKind::FinIndicator)
    }
}

impl fmt::Display for FinStatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinStatKind::Income => "income",
            FinStatKind::CashFlow => "cash_flow",
            FinStatKind::BalanceSheet => "balance_sheet",
            FinStatKind::FinIndicator => "fin_indicator",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FinStatKind {
    type Err = RefDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "income" => Ok(FinStatKind::Income),
            "cash_flow" => Ok(FinStatKind::CashFlow),
            "balance_sheet" => Ok(FinStatKind::BalanceSheet),
            "fin_indicator" => Ok(FinStatKind::FinIndicator),
            other => Err(RefDataError::InvalidArgument(format!(
                "statement kind must be income, cash_flow, balance_sheet or fin_indicator, got '{other}'"
            ))),
        }
    }
}

impl<F: RawRecordFetcher, C: CalendarProvider> DataService<F, C> {
    /// Statement rows announced in `[start, end]`, ordered by report date.
    ///
    /// With `drop_dup_cols`, rows are sorted on those columns and only the
    /// first row of each distinct combination is kept.
    pub fn query_fin_stat(
        &self,
        kind: FinStatKind,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        fields: &FieldList,
        drop_dup_cols: Option<&[String]>,
    ) -> Result<QueryOutcome<DataFrame>> {
        let mut filter = Filter::new()
            .symbols(symbols)
            .date("start_date", start)
            .date("end_date", end);
        if kind.uses_report_type() {
            filter = filter.set("report_type", &self.config.report_type);
        }
        let query = Query::new(kind.view())
            .filter(filter)
            .fields(fields.clone())
            .order_by("report_date");
        let (mut rows, status) = self.fetch(&query)?;
        coerce_int_fields(kind.view(), &mut rows, &["ann_date", "report_date"])?;
        if let Some(cols) = drop_dup_cols {
            rows = Canonicalizer::dedup_on(rows, cols);
        }
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Per-day valuation indicators, ordered by trade date.
    pub fn query_daily_indicator(
        &self,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        fields: &FieldList,
    ) -> Result<QueryOutcome<DataFrame>> {
        let query = Query::new(views::SEC_DAILY_INDICATOR)
            .filter(
                Filter::new()
                    .symbols(symbols)
                    .date("start_date", start)
                    .date("end_date", end),
            )
            .fields(fields.clone())
            .order_by("trade_date");
        let (rows, status) = self.fetch(&query)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Instrument reference rows. `inst_type` defaults to the configured list.
    pub fn query_inst_info(
        &self,
        symbols: &SymbolList,
        inst_type: Option<&str>,
        fields: &FieldList,
    ) -> Result<QueryOutcome<DataFrame>> {
        let inst_type = inst_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(self.config.default_inst_types.as_str());
        let query = Query::new(views::INSTRUMENT_INFO)
            .filter(Filter::new().symbols(symbols).set("inst_type", inst_type))
            .fields(fields.clone())
            .order_by("symbol");
        let (mut rows, status) = self.fetch(&query)?;
        coerce_int_fields(
            views::INSTRUMENT_INFO,
            &mut rows,
            &["list_date", "delist_date", "inst_type"],
        )?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }
}

//! Market data delegations: daily bars, minute bars, ticks, quotes and the
//! generic view query.

use super::{DataService, QueryOutcome};
use crate::data::{views, CalendarProvider, Canonicalizer, FieldList, Filter, Query, RawRecordFetcher};
use crate::domain::{SymbolList, TradeTime, TradingDate};
use crate::error::{RefDataError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price adjustment applied by the daily view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMode {
    /// Forward adjusted.
    Pre,
    /// Backward adjusted.
    Post,
}

impl fmt::Display for AdjustMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustMode::Pre => write!(f, "pre"),
            AdjustMode::Post => write!(f, "post"),
        }
    }
}

impl FromStr for AdjustMode {
    type Err = RefDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre" => Ok(AdjustMode::Pre),
            "post" => Ok(AdjustMode::Post),
            other => Err(RefDataError::InvalidArgument(format!(
                "adjust mode must be pre or post, got '{other}'"
            ))),
        }
    }
}

/// Minute bar width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BarFreq {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
}

impl fmt::Display for BarFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BarFreq::OneMinute => "1m",
            BarFreq::FiveMinutes => "5m",
            BarFreq::FifteenMinutes => "15m",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BarFreq {
    type Err = RefDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1m" => Ok(BarFreq::OneMinute),
            "5m" => Ok(BarFreq::FiveMinutes),
            "15m" => Ok(BarFreq::FifteenMinutes),
            other => Err(RefDataError::InvalidArgument(format!(
                "bar frequency must be 1m, 5m or 15m, got '{other}'"
            ))),
        }
    }
}

/// Parameters shared by bar and tick queries.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradayRequest {
    pub symbols: SymbolList,
    pub start_time: TradeTime,
    pub end_time: TradeTime,
    /// Session to query; the service's current session when absent.
    pub trade_date: Option<TradingDate>,
    pub fields: FieldList,
}

impl IntradayRequest {
    /// Whole session, all fields.
    pub fn new(symbols: SymbolList) -> Self {
        Self {
            symbols,
            start_time: TradeTime::SESSION_START,
            end_time: TradeTime::SESSION_END,
            trade_date: None,
            fields: FieldList::all(),
        }
    }

    pub fn between(mut self, start: TradeTime, end: TradeTime) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn on(mut self, trade_date: TradingDate) -> Self {
        self.trade_date = Some(trade_date);
        self
    }

    pub fn fields(mut self, fields: FieldList) -> Self {
        self.fields = fields;
        self
    }

    fn filter(&self) -> Filter {
        Filter::new()
            .symbols(&self.symbols)
            .time("start_time", self.start_time)
            .time("end_time", self.end_time)
            .optional_date("trade_date", self.trade_date)
    }
}

impl<F: RawRecordFetcher, C: CalendarProvider> DataService<F, C> {
    /// Run any view query and return its rows as a frame.
    pub fn query(
        &self,
        view: &str,
        filter: &Filter,
        fields: &FieldList,
        order_by: Option<&str>,
    ) -> Result<QueryOutcome<DataFrame>> {
        let mut query = Query::new(view).filter(filter.clone()).fields(fields.clone());
        if let Some(order) = order_by {
            query = query.order_by(order);
        }
        let (rows, status) = self.fetch(&query)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Daily bars. Exact duplicate rows are dropped.
    pub fn daily(
        &self,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        fields: &FieldList,
        adjust: Option<AdjustMode>,
    ) -> Result<QueryOutcome<DataFrame>> {
        let mut filter = Filter::new()
            .symbols(symbols)
            .date("start_date", start)
            .date("end_date", end);
        if let Some(mode) = adjust {
            filter = filter.set("adjust_mode", mode);
        }
        let query = Query::new(views::DAILY)
            .filter(filter)
            .fields(fields.clone());
        let (rows, status) = self.fetch(&query)?;
        let rows = Canonicalizer::dedup(rows);
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Minute bars of the requested width.
    pub fn bar(&self, request: &IntradayRequest, freq: BarFreq) -> Result<QueryOutcome<DataFrame>> {
        let query = Query::new(views::BAR)
            .filter(request.filter().set("freq", freq))
            .fields(request.fields.clone());
        let (rows, status) = self.fetch(&query)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    pub fn tick(&self, request: &IntradayRequest) -> Result<QueryOutcome<DataFrame>> {
        let query = Query::new(views::TICK)
            .filter(request.filter())
            .fields(request.fields.clone());
        let (rows, status) = self.fetch(&query)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Latest quote snapshot per symbol.
    pub fn quote(&self, symbols: &SymbolList, fields: &FieldList) -> Result<QueryOutcome<DataFrame>> {
        let query = Query::new(views::QUOTE)
            .filter(Filter::new().symbols(symbols))
            .fields(fields.clone());
        let (rows, status) = self.fetch(&query)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }
}

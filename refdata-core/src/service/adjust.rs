//! Price adjustment factors.

use super::{coerce_date_fields, coerce_float_fields, empty_panel, DataService, QueryOutcome};
use crate::data::{
    views, CalendarProvider, Canonicalizer, FetchStatus, FieldList, Filter, Query, RawRecordFetcher,
    ViewSchema,
};
use crate::domain::{Record, RowContext, SymbolList, TradingDate};
use crate::error::Result;
use crate::panel::{build_series, to_ratio, FactorPanel, PanelAligner, PanelKey, PointEvent, Universe};
use polars::prelude::DataFrame;
use std::collections::BTreeSet;
use tracing::{debug, info};

impl<F: RawRecordFetcher, C: CalendarProvider> DataService<F, C> {
    fn adj_factor_rows(
        &self,
        symbols: &SymbolList,
        start: Option<TradingDate>,
        end: Option<TradingDate>,
    ) -> Result<(Vec<Record>, FetchStatus)> {
        let query = Query::new(views::SEC_ADJ_FACTOR)
            .filter(
                Filter::new()
                    .symbols(symbols)
                    .optional_date("start_date", start)
                    .optional_date("end_date", end),
            )
            .fields(FieldList::of(&["symbol", "trade_date", "adjust_factor"]))
            .order_by("symbol");
        let (mut rows, status) = self.fetch(&query)?;
        ViewSchema::SEC_ADJ_FACTOR.validate(&rows)?;
        for (i, row) in rows.iter_mut().enumerate() {
            let symbol = RowContext::new(views::SEC_ADJ_FACTOR, i).entity(row, "symbol")?;
            row.insert("symbol", symbol.as_str());
        }
        coerce_date_fields(views::SEC_ADJ_FACTOR, &mut rows, &["trade_date"])?;
        coerce_float_fields(views::SEC_ADJ_FACTOR, &mut rows, &["adjust_factor"])?;
        Ok((Canonicalizer::dedup(rows), status))
    }

    /// Adjustment factor rows: symbol as text, trade date as an integer,
    /// factor as a float. An absent bound leaves that side open.
    pub fn adj_factor_raw(
        &self,
        symbols: &SymbolList,
        start: Option<TradingDate>,
        end: Option<TradingDate>,
    ) -> Result<QueryOutcome<DataFrame>> {
        let (rows, status) = self.adj_factor_rows(symbols, start, end)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Daily adjustment factors over every trading date between the first
    /// and last observation.
    ///
    /// Values are filled forward from each entity's first observation, so
    /// dates before it stay unfilled. When the observed dates skip trading
    /// days, the panel is moved onto the full calendar and filled forward,
    /// then backward. With `ratio` the panel holds day-over-day ratios
    /// instead of absolute factors.
    pub fn adj_factor_daily(
        &self,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        ratio: bool,
    ) -> Result<QueryOutcome<FactorPanel>> {
        let key = PanelKey::new("adj_factor_daily")
            .param("symbols", symbols.joined())
            .param("start", start)
            .param("end", end)
            .param("ratio", ratio)
            .param("fetcher", self.fetcher.name());
        self.cached_panel(key, || self.build_adj_factor_daily(symbols, start, end, ratio))
    }

    fn build_adj_factor_daily(
        &self,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        ratio: bool,
    ) -> Result<QueryOutcome<FactorPanel>> {
        info!(symbols = symbols.len(), %start, %end, ratio, "building daily adjustment factors");
        let (rows, status) = self.adj_factor_rows(symbols, Some(start), Some(end))?;

        let mut events = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let ctx = RowContext::new(views::SEC_ADJ_FACTOR, i);
            events.push((
                ctx.entity(row, "symbol")?,
                PointEvent::new(ctx.date(row, "trade_date")?, ctx.float(row, "adjust_factor")?),
            ));
        }

        let observed: BTreeSet<TradingDate> = events.iter().map(|(_, e)| e.effective).collect();
        let span = observed.first().copied().zip(observed.last().copied());
        let Some((first, last)) = span else {
            let dates = self.trading_dates(start, end)?;
            return empty_panel(views::SEC_ADJ_FACTOR, dates, status);
        };

        let native: Vec<TradingDate> = observed.into_iter().collect();
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        let panel = PanelAligner::new(&native, &universe)?.forward_fill(&series, None)?;
        let calendar = self.trading_dates(first, last)?;
        let panel = if calendar == native {
            panel
        } else {
            debug!(observed = native.len(), calendar = calendar.len(), "reindexing factors onto calendar");
            panel.reindex(calendar)?.forward_fill().backward_fill()
        };
        let panel = if ratio { to_ratio(&panel) } else { panel };
        info!(dates = panel.n_dates(), entities = panel.n_entities(), "daily adjustment factors ready");
        Ok(QueryOutcome::new(panel, status))
    }
}

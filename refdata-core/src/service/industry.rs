//! Industry classification, raw and as a daily point-in-time panel.

use super::{coerce_date_fields, empty_panel, DataService, QueryOutcome};
use crate::config::IndustryKind;
use crate::data::{
    views, CalendarProvider, Canonicalizer, FetchStatus, FieldList, Filter, Query, RawRecordFetcher,
    ViewSchema,
};
use crate::domain::{Record, RowContext, SymbolList, TradingDate};
use crate::error::{RefDataError, Result};
use crate::panel::{build_series, IndustryPanel, PanelAligner, PanelKey, PointEvent, Universe};
use polars::prelude::DataFrame;
use tracing::info;

fn code_field(level: u8) -> String {
    format!("industry{level}_code")
}

fn check_level(level: u8) -> Result<()> {
    if (1..=4).contains(&level) {
        Ok(())
    } else {
        Err(RefDataError::InvalidArgument(format!(
            "industry level must be 1, 2, 3 or 4, got {level}"
        )))
    }
}

impl<F: RawRecordFetcher, C: CalendarProvider> DataService<F, C> {
    fn industry_rows(
        &self,
        symbols: &SymbolList,
        kind: IndustryKind,
        level: u8,
    ) -> Result<(Vec<Record>, FetchStatus)> {
        check_level(level)?;
        let source = self.config.industry_source(kind)?;
        let code = code_field(level);
        let name = format!("industry{level}_name");
        let fields = [
            "symbol",
            "in_date",
            "out_date",
            "ann_date",
            code.as_str(),
            name.as_str(),
        ];
        let query = Query::new(views::SEC_INDUSTRY)
            .filter(
                Filter::new()
                    .symbols(symbols)
                    .set("industry_src", source),
            )
            .fields(FieldList::of(&fields))
            .order_by("symbol");
        let (mut rows, status) = self.fetch(&query)?;
        ViewSchema::SEC_INDUSTRY.validate(&rows)?;
        coerce_date_fields(views::SEC_INDUSTRY, &mut rows, &["in_date"])?;
        Ok((Canonicalizer::dedup(rows), status))
    }

    /// Classification records for `symbols` under scheme `kind` at `level`
    /// (1 to 4), duplicates removed.
    pub fn industry_raw(
        &self,
        symbols: &SymbolList,
        kind: IndustryKind,
        level: u8,
    ) -> Result<QueryOutcome<DataFrame>> {
        let (rows, status) = self.industry_rows(symbols, kind, level)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Daily industry code per symbol.
    ///
    /// A classification is visible from its announcement date (the in date
    /// when no announcement date is recorded). Dates before a symbol's first
    /// visible classification take that first classification.
    pub fn industry_daily(
        &self,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        kind: IndustryKind,
        level: u8,
    ) -> Result<QueryOutcome<IndustryPanel>> {
        check_level(level)?;
        let key = PanelKey::new("industry_daily")
            .param("symbols", symbols.joined())
            .param("start", start)
            .param("end", end)
            .param("kind", kind)
            .param("level", level)
            .param("source", self.config.industry_source(kind)?)
            .param("fetcher", self.fetcher.name());
        self.cached_panel(key, || self.build_industry_daily(symbols, start, end, kind, level))
    }

    fn build_industry_daily(
        &self,
        symbols: &SymbolList,
        start: TradingDate,
        end: TradingDate,
        kind: IndustryKind,
        level: u8,
    ) -> Result<QueryOutcome<IndustryPanel>> {
        info!(symbols = symbols.len(), %start, %end, %kind, level, "building daily industry");
        let (rows, status) = self.industry_rows(symbols, kind, level)?;
        let dates = self.trading_dates(start, end)?;
        if rows.is_empty() {
            return empty_panel(views::SEC_INDUSTRY, dates, status);
        }

        let code = code_field(level);
        ViewSchema::SEC_INDUSTRY.validate_with(&rows, &code)?;

        let mut events = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let ctx = RowContext::new(views::SEC_INDUSTRY, i);
            let in_date = ctx.date(row, "in_date")?;
            let announced = ctx.optional_date(row, "ann_date")?.unwrap_or(in_date);
            let value = ctx.category(row, &code)?.ok_or_else(|| RefDataError::MalformedRecord {
                view: views::SEC_INDUSTRY.to_string(),
                row: i,
                field: code.clone(),
                value: "<blank>".to_string(),
            })?;
            events.push((
                ctx.entity(row, "symbol")?,
                PointEvent::announced_at(in_date, announced, value),
            ));
        }
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        let panel = PanelAligner::new(&dates, &universe)?.announcement_gated(&series)?;
        info!(dates = panel.n_dates(), entities = panel.n_entities(), "daily industry ready");
        Ok(QueryOutcome::new(panel, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bounds() {
        assert!(check_level(0).is_err());
        assert!(check_level(1).is_ok());
        assert!(check_level(4).is_ok());
        assert!(check_level(5).is_err());
        assert_eq!(code_field(2), "industry2_code");
    }
}

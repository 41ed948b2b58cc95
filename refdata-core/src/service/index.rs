//! Index weights and index membership.

use super::{coerce_float_fields, empty_panel, DataService, QueryOutcome};
use crate::data::{
    views, CalendarProvider, Canonicalizer, FetchStatus, Filter, Query, RawRecordFetcher, ViewSchema,
};
use crate::domain::{EntityId, Record, RowContext, SnapshotPeriod, TradingDate};
use crate::error::Result;
use crate::panel::{
    build_series, IntervalEvent, MembershipPanel, PanelAligner, PanelKey, PointEvent, Universe,
    WeightPanel,
};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl<F: RawRecordFetcher, C: CalendarProvider> DataService<F, C> {
    fn weight_rows(&self, index: &str, trade_date: TradingDate) -> Result<(Vec<Record>, FetchStatus)> {
        let code = self.config.resolve_index(index);
        let query = Query::new(views::INDEX_WEIGHT).filter(
            Filter::new()
                .set("index_code", &code)
                .date("trade_date", trade_date),
        );
        let (mut rows, status) = self.fetch(&query)?;
        ViewSchema::INDEX_WEIGHT.validate(&rows)?;
        coerce_float_fields(views::INDEX_WEIGHT, &mut rows, &["weight"])?;
        Ok((rows, status))
    }

    /// Constituent weights of the latest snapshot on or before `trade_date`.
    pub fn index_weights(&self, index: &str, trade_date: TradingDate) -> Result<QueryOutcome<DataFrame>> {
        let (rows, status) = self.weight_rows(index, trade_date)?;
        Ok(QueryOutcome::new(Canonicalizer::to_frame(&rows)?, status))
    }

    /// Every symbol that was a constituent at some point in `[start, end]`,
    /// sorted and unique.
    pub fn index_members(
        &self,
        index: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<QueryOutcome<Vec<EntityId>>> {
        let (rows, status) = self.cons_rows(index, start, end)?;
        let mut ids = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            ids.push(RowContext::new(views::INDEX_CONS, i).entity(row, "symbol")?);
        }
        Ok(QueryOutcome::new(Universe::resolve(ids).into_vec(), status))
    }

    fn cons_rows(
        &self,
        index: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<(Vec<Record>, FetchStatus)> {
        let query = Query::new(views::INDEX_CONS)
            .filter(
                Filter::new()
                    .set("index_code", index)
                    .date("start_date", start)
                    .date("end_date", end),
            )
            .order_by("symbol");
        self.fetch(&query)
    }

    /// Daily weight panel built from periodic snapshots.
    ///
    /// Snapshots are taken at each period boundary (snapped forward onto the
    /// trading calendar), starting from the boundary on or before `start` so
    /// the first rows are seeded. A symbol missing from a snapshot it
    /// previously appeared in gets weight 0 from that snapshot on; dates
    /// before a symbol's first snapshot are 0.
    pub fn index_weights_daily(
        &self,
        index: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<QueryOutcome<WeightPanel>> {
        let key = PanelKey::new("index_weights_daily")
            .param("index", self.config.resolve_index(index))
            .param("start", start)
            .param("end", end)
            .param("period", format!("{:?}", self.config.snapshot_period))
            .param("fetcher", self.fetcher.name());
        self.cached_panel(key, || self.build_index_weights_daily(index, start, end))
    }

    fn build_index_weights_daily(
        &self,
        index: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<QueryOutcome<WeightPanel>> {
        info!(index, %start, %end, "building daily index weights");
        let dates = self.trading_dates(start, end)?;

        let period = self.config.snapshot_period;
        let snapshot_dates = match (start.to_naive(), dates.last()) {
            (Some(first), Some(&last)) => {
                let lookback = TradingDate::from_naive(period.boundary_on_or_before(first));
                let calendar = self.trading_dates(lookback, last)?;
                snapshot_schedule(&calendar, period)
            }
            _ => Vec::new(),
        };

        let mut status = FetchStatus::ok();
        let mut snapshots: Vec<(TradingDate, BTreeMap<EntityId, f64>)> = Vec::new();
        for td in snapshot_dates {
            let (rows, s) = self.weight_rows(index, td)?;
            status = s;
            let mut weights = BTreeMap::new();
            for (i, row) in rows.iter().enumerate() {
                let ctx = RowContext::new(views::INDEX_WEIGHT, i);
                weights.insert(ctx.entity(row, "symbol")?, ctx.float(row, "weight")?);
            }
            debug!(snapshot = %td, constituents = weights.len(), "weight snapshot");
            snapshots.push((td, weights));
        }

        let universe = Universe::resolve(snapshots.iter().flat_map(|(_, w)| w.keys().cloned()));
        if universe.is_empty() {
            return empty_panel(views::INDEX_WEIGHT, dates, status);
        }

        let mut events = Vec::new();
        for (td, weights) in &snapshots {
            for id in universe.iter() {
                let weight = weights.get(id).copied().unwrap_or(0.0);
                events.push((id.clone(), PointEvent::new(*td, weight)));
            }
        }
        let series = build_series(events);
        let panel = PanelAligner::new(&dates, &universe)?.forward_fill(&series, Some(0.0))?;
        info!(dates = panel.n_dates(), entities = panel.n_entities(), "daily index weights ready");
        Ok(QueryOutcome::new(panel, status))
    }

    /// Daily 0/1 membership: 1 strictly between a symbol's in and out dates.
    pub fn index_membership(
        &self,
        index: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<QueryOutcome<MembershipPanel>> {
        let key = PanelKey::new("index_membership")
            .param("index", index)
            .param("start", start)
            .param("end", end)
            .param("fetcher", self.fetcher.name());
        self.cached_panel(key, || self.build_index_membership(index, start, end))
    }

    fn build_index_membership(
        &self,
        index: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<QueryOutcome<MembershipPanel>> {
        info!(index, %start, %end, "building index membership");
        let (rows, status) = self.cons_rows(index, start, end)?;
        let dates = self.trading_dates(start, end)?;
        if rows.is_empty() {
            return empty_panel(views::INDEX_CONS, dates, status);
        }
        ViewSchema::INDEX_CONS.validate(&rows)?;

        let mut events = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let ctx = RowContext::new(views::INDEX_CONS, i);
            let interval = IntervalEvent::new(
                ctx.interval_bound(row, "in_date")?,
                ctx.interval_bound(row, "out_date")?,
            );
            events.push((ctx.entity(row, "symbol")?, interval));
        }
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        let panel = PanelAligner::new(&dates, &universe)?.membership(&series)?;
        info!(dates = panel.n_dates(), entities = panel.n_entities(), "index membership ready");
        Ok(QueryOutcome::new(panel, status))
    }
}

/// Snapshot dates: the first calendar date, then the first calendar date on
/// or after each following period boundary.
fn snapshot_schedule(calendar: &[TradingDate], period: SnapshotPeriod) -> Vec<TradingDate> {
    let mut out = Vec::new();
    let Some(&first) = calendar.first() else {
        return out;
    };
    let mut current = first;
    loop {
        out.push(current);
        let Some(naive) = current.to_naive() else {
            break;
        };
        let boundary = TradingDate::from_naive(period.next_boundary(naive));
        let idx = calendar.partition_point(|d| *d < boundary);
        match calendar.get(idx) {
            Some(&next) if next > current => current = next,
            _ => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::WeekdayCalendar;

    fn td(v: i64) -> TradingDate {
        TradingDate::from_int(v).unwrap()
    }

    #[test]
    fn monthly_schedule_snaps_to_trading_days() {
        let calendar = WeekdayCalendar::with_holidays([td(20200101)])
            .trading_dates(td(20191202), td(20200305))
            .unwrap();
        let schedule = snapshot_schedule(&calendar, SnapshotPeriod::Month);
        assert_eq!(
            schedule,
            vec![td(20191202), td(20200102), td(20200203), td(20200302)]
        );
    }

    #[test]
    fn weekly_schedule_lands_on_mondays() {
        let calendar = WeekdayCalendar::new()
            .trading_dates(td(20200106), td(20200121))
            .unwrap();
        let schedule = snapshot_schedule(&calendar, SnapshotPeriod::Week);
        assert_eq!(schedule, vec![td(20200106), td(20200113), td(20200120)]);
    }

    #[test]
    fn empty_calendar_has_no_snapshots() {
        assert!(snapshot_schedule(&[], SnapshotPeriod::Day).is_empty());
    }
}

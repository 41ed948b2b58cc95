//! Point-in-time alignment of event series onto a dense panel.
//!
//! Three fill policies share one resolution rule for point events: on each
//! axis date the visible value comes from the records announced on or before
//! that date, taking the one with the greatest `(effective date, sorted
//! position)`. A record dated between axis dates therefore lands on the first
//! axis date after it, and a record dated before the axis start seeds the
//! first row.
//!
//! - [`FillPolicy::IntervalMembership`]: 1 when `in_date < d < out_date` for
//!   any of the entity's intervals, else 0
//! - [`FillPolicy::ForwardFill`]: announcement equals effective date; cells
//!   before the first value take the caller's leading value or stay unfilled
//! - [`FillPolicy::AnnouncementGated`]: values hidden until announced, then
//!   leading gaps back-filled once from the earliest visible value

use super::dense::DensePanel;
use super::series::{build_series, IntervalEvent, PointEvent, SeriesMap};
use super::universe::Universe;
use crate::domain::TradingDate;
use crate::error::{RefDataError, Result};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    IntervalMembership,
    ForwardFill,
    AnnouncementGated,
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillPolicy::IntervalMembership => "interval-membership",
            FillPolicy::ForwardFill => "forward-fill",
            FillPolicy::AnnouncementGated => "announcement-gated",
        };
        write!(f, "{name}")
    }
}

/// Aligns series onto a fixed (date axis, universe) pair.
pub struct PanelAligner<'a> {
    dates: &'a [TradingDate],
    universe: &'a Universe,
}

impl<'a> PanelAligner<'a> {
    pub fn new(dates: &'a [TradingDate], universe: &'a Universe) -> Result<Self> {
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(RefDataError::InvalidArgument(format!(
                "trading calendar not strictly increasing at {} -> {}",
                w[0], w[1]
            )));
        }
        Ok(Self { dates, universe })
    }

    fn unfilled<T: Clone>(&self) -> Result<DensePanel<T>> {
        DensePanel::new_unfilled(self.dates.to_vec(), self.universe.ids().to_vec())
    }

    /// 0/1 membership. Entities without intervals are 0 everywhere.
    pub fn membership(&self, series: &SeriesMap<IntervalEvent>) -> Result<DensePanel<u8>> {
        let mut panel = self.unfilled::<u8>()?;
        for col in 0..self.universe.len() {
            for row in 0..self.dates.len() {
                panel.set_at(row, col, Some(0));
            }
        }

        for (col, entity) in self.universe.iter().enumerate() {
            let Some(entity_series) = series.get(entity) else {
                continue;
            };
            for iv in entity_series.events() {
                let lo = self.dates.partition_point(|d| *d <= iv.in_date);
                let hi = self.dates.partition_point(|d| *d < iv.out_date);
                for row in lo..hi.max(lo) {
                    panel.set_at(row, col, Some(1));
                }
            }
        }

        debug!(
            policy = %FillPolicy::IntervalMembership,
            dates = self.dates.len(),
            entities = self.universe.len(),
            "aligned panel"
        );
        Ok(panel)
    }

    /// Forward-fill the last known value. Dates before an entity's first
    /// value take `leading` (or stay unfilled when `None`).
    pub fn forward_fill<T: Clone>(
        &self,
        series: &SeriesMap<PointEvent<T>>,
        leading: Option<T>,
    ) -> Result<DensePanel<T>> {
        let mut panel = self.unfilled::<T>()?;
        for (col, entity) in self.universe.iter().enumerate() {
            let events = series.get(entity).map(|s| s.events()).unwrap_or(&[]);
            let visible = resolve_visible(self.dates, events, |e| e.effective);
            for (row, idx) in visible.into_iter().enumerate() {
                let cell = match idx {
                    Some(i) => Some(events[i].value.clone()),
                    None => leading.clone(),
                };
                panel.set_at(row, col, cell);
            }
        }

        debug!(
            policy = %FillPolicy::ForwardFill,
            dates = self.dates.len(),
            entities = self.universe.len(),
            filled = panel.filled_count(),
            "aligned panel"
        );
        Ok(panel)
    }

    /// Announcement-gated forward-fill, then a single back-fill of each
    /// entity's leading gap from its earliest visible value.
    ///
    /// An entity with nothing visible anywhere on the axis stays unfilled.
    pub fn announcement_gated<T: Clone>(
        &self,
        series: &SeriesMap<PointEvent<T>>,
    ) -> Result<DensePanel<T>> {
        let mut panel = self.unfilled::<T>()?;
        for (col, entity) in self.universe.iter().enumerate() {
            let events = series.get(entity).map(|s| s.events()).unwrap_or(&[]);
            let visible = resolve_visible(self.dates, events, |e| e.announced);
            let first = visible.iter().flatten().next().copied();
            for (row, idx) in visible.into_iter().enumerate() {
                let cell = idx.or(first).map(|i| events[i].value.clone());
                panel.set_at(row, col, cell);
            }
        }

        debug!(
            policy = %FillPolicy::AnnouncementGated,
            dates = self.dates.len(),
            entities = self.universe.len(),
            filled = panel.filled_count(),
            "aligned panel"
        );
        Ok(panel)
    }
}

/// For each axis date, the index (into `events`) of the visible record.
///
/// `events` must be sorted by effective date (stable). A record becomes a
/// candidate once `visible_from(record) <= date`; among candidates the
/// greatest `(effective, position)` wins. The candidate set only grows, so
/// a single sweep over records ordered by visibility date suffices.
fn resolve_visible<T, F>(
    dates: &[TradingDate],
    events: &[PointEvent<T>],
    visible_from: F,
) -> Vec<Option<usize>>
where
    F: Fn(&PointEvent<T>) -> TradingDate,
{
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by_key(|&i| visible_from(&events[i]));

    let mut out = Vec::with_capacity(dates.len());
    let mut next = 0;
    let mut best: Option<usize> = None;
    for &date in dates {
        while next < order.len() && visible_from(&events[order[next]]) <= date {
            let i = order[next];
            best = match best {
                Some(b) if (events[b].effective, b) > (events[i].effective, i) => Some(b),
                _ => Some(i),
            };
            next += 1;
        }
        out.push(best);
    }
    out
}

/// Point series reproducing a panel: one event per filled cell, dated at
/// its row.
pub fn series_from_panel<T: Clone + PartialEq>(panel: &DensePanel<T>) -> SeriesMap<PointEvent<T>> {
    let mut events = Vec::with_capacity(panel.filled_count());
    for (col, entity) in panel.entities().iter().enumerate() {
        for (row, date) in panel.dates().iter().enumerate() {
            if let Some(v) = panel.get_at(row, col) {
                events.push((entity.clone(), PointEvent::new(*date, v.clone())));
            }
        }
    }
    build_series(events)
}

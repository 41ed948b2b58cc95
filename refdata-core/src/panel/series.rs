//! Per-entity event series.
//!
//! Events arrive in source order, are grouped by entity, stably sorted by
//! start date, and exact duplicates are dropped keeping the first.

use crate::domain::{EntityId, TradingDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything with a start date the series can be ordered by.
pub trait Event {
    fn start(&self) -> TradingDate;
}

/// A value effective from `effective`, visible from `announced`.
///
/// Plain forward-fill uses `announced == effective`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEvent<T> {
    pub effective: TradingDate,
    pub announced: TradingDate,
    pub value: T,
}

impl<T> PointEvent<T> {
    pub fn new(effective: TradingDate, value: T) -> Self {
        Self {
            effective,
            announced: effective,
            value,
        }
    }

    pub fn announced_at(effective: TradingDate, announced: TradingDate, value: T) -> Self {
        Self {
            effective,
            announced,
            value,
        }
    }
}

impl<T> Event for PointEvent<T> {
    fn start(&self) -> TradingDate {
        self.effective
    }
}

/// Membership over `(in_date, out_date)`; `out_date` may be the open-ended sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalEvent {
    pub in_date: TradingDate,
    pub out_date: TradingDate,
}

impl IntervalEvent {
    pub fn new(in_date: TradingDate, out_date: TradingDate) -> Self {
        Self { in_date, out_date }
    }

    /// Strict containment: `in_date < date < out_date`.
    pub fn contains(&self, date: TradingDate) -> bool {
        self.in_date < date && date < self.out_date
    }
}

impl Event for IntervalEvent {
    fn start(&self) -> TradingDate {
        self.in_date
    }
}

/// One entity's events, ascending by start date.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSeries<E> {
    entity: EntityId,
    events: Vec<E>,
}

impl<E> EventSeries<E> {
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Series keyed by entity, iterated in entity order.
pub type SeriesMap<E> = BTreeMap<EntityId, EventSeries<E>>;

/// Group events by entity, sort each group by start date (stable), and drop
/// exact duplicates after the first.
///
/// Duplicates necessarily share a start date, so only runs of equal start
/// are compared.
pub fn build_series<E, I>(events: I) -> SeriesMap<E>
where
    E: Event + PartialEq,
    I: IntoIterator<Item = (EntityId, E)>,
{
    let mut grouped: BTreeMap<EntityId, Vec<E>> = BTreeMap::new();
    for (entity, event) in events {
        grouped.entry(entity).or_default().push(event);
    }

    grouped
        .into_iter()
        .map(|(entity, mut events)| {
            events.sort_by_key(|e| e.start());
            let mut kept: Vec<E> = Vec::with_capacity(events.len());
            let mut run_start = 0;
            for event in events {
                if kept.last().map(|e| e.start()) != Some(event.start()) {
                    run_start = kept.len();
                }
                if !kept[run_start..].contains(&event) {
                    kept.push(event);
                }
            }
            let series = EventSeries {
                entity: entity.clone(),
                events: kept,
            };
            (entity, series)
        })
        .collect()
}

/// Total events across all series.
pub fn event_count<E>(series: &SeriesMap<E>) -> usize {
    series.values().map(EventSeries::len).sum()
}

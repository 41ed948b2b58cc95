//! Property tests for panel engine invariants.
//!
//! Uses proptest to verify:
//! 1. Interval membership matches the strict `in < d < out` rule cell by cell
//! 2. Forward-fill idempotence: re-aligning a filled panel is a no-op
//! 3. Universe columns are exactly the distinct ids of the input
//! 4. Ratio round-trip: cumulating ratios reproduces absolute factors
//! 5. Announcement gating never exposes a value before its announcement
//! 6. Duplicate events collapse to one

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use refdata_core::domain::{EntityId, TradingDate};
use refdata_core::panel::{
    build_series, cumulate, event_count, series_from_panel, to_ratio, DensePanel, IntervalEvent,
    PanelAligner, PointEvent, Universe,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn day(offset: i64) -> TradingDate {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    TradingDate::from_naive(base + Duration::days(offset))
}

/// Strictly increasing axis of up to 40 dates within ~120 days.
fn arb_axis() -> impl Strategy<Value = Vec<TradingDate>> {
    prop::collection::btree_set(0..120i64, 1..40)
        .prop_map(|set| set.into_iter().map(day).collect())
}

fn arb_entity() -> impl Strategy<Value = EntityId> {
    prop::sample::select(vec!["A", "B", "C", "D"]).prop_map(EntityId::from)
}

fn arb_intervals() -> impl Strategy<Value = Vec<(EntityId, IntervalEvent)>> {
    prop::collection::vec(
        (arb_entity(), -10..130i64, 0..60i64, any::<bool>()),
        0..12,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(e, start, len, open)| {
                let out = if open {
                    TradingDate::OPEN_END
                } else {
                    day(start + len)
                };
                (e, IntervalEvent::new(day(start), out))
            })
            .collect()
    })
}

fn arb_points() -> impl Strategy<Value = Vec<(EntityId, PointEvent<f64>)>> {
    prop::collection::vec((arb_entity(), -10..130i64, 0..20i64, 1..1000u32), 0..20).prop_map(
        |raw| {
            raw.into_iter()
                .map(|(e, eff, lag, v)| {
                    (
                        e,
                        PointEvent::announced_at(day(eff), day(eff + lag), f64::from(v)),
                    )
                })
                .collect()
        },
    )
}

// ── 1. Interval membership ───────────────────────────────────────────

proptest! {
    #[test]
    fn membership_matches_strict_rule(axis in arb_axis(), events in arb_intervals()) {
        let raw = events.clone();
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        let panel = PanelAligner::new(&axis, &universe).unwrap().membership(&series).unwrap();

        prop_assert!(panel.is_fully_filled());
        for (col, entity) in universe.iter().enumerate() {
            for (row, d) in axis.iter().enumerate() {
                let expected = raw
                    .iter()
                    .any(|(e, iv)| e == entity && iv.in_date < *d && *d < iv.out_date);
                prop_assert_eq!(panel.get_at(row, col), Some(&u8::from(expected)));
            }
        }
    }
}

// ── 2. Forward-fill idempotence ──────────────────────────────────────

proptest! {
    #[test]
    fn forward_fill_is_idempotent(axis in arb_axis(), events in arb_points()) {
        let events: Vec<_> = events
            .into_iter()
            .map(|(e, p)| (e, PointEvent::new(p.effective, p.value)))
            .collect();
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        let aligner = PanelAligner::new(&axis, &universe).unwrap();
        let first = aligner.forward_fill(&series, Some(0.0)).unwrap();
        let again = aligner.forward_fill(&series_from_panel(&first), Some(0.0)).unwrap();
        prop_assert_eq!(first, again);
    }
}

// ── 3. Universe ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn universe_is_sorted_distinct_input_ids(events in arb_points()) {
        let mut ids: Vec<EntityId> = events.iter().map(|(e, _)| e.clone()).collect();
        ids.sort();
        ids.dedup();
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        prop_assert_eq!(universe.ids(), ids.as_slice());
    }
}

// ── 4. Ratio round-trip ──────────────────────────────────────────────

proptest! {
    #[test]
    fn ratios_cumulate_back_to_factors(
        axis in arb_axis(),
        columns in prop::collection::vec(prop::collection::vec(0.5..4.0f64, 40), 1..4),
    ) {
        let n = axis.len();
        let entities: Vec<EntityId> = (0..columns.len())
            .map(|j| EntityId::new(format!("E{j}")))
            .collect();
        let cells: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|c| c[..n].iter().copied().map(Some).collect())
            .collect();
        let panel = DensePanel::from_columns(axis.clone(), entities, cells).unwrap();

        let ratio = to_ratio(&panel);
        let back = cumulate(&ratio, panel.row(0)).unwrap();
        for row in 0..n {
            for col in 0..panel.n_entities() {
                let a = *panel.get_at(row, col).unwrap();
                let b = *back.get_at(row, col).unwrap();
                prop_assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0), "{} vs {}", a, b);
            }
        }
    }
}

// ── 5. Announcement gating ───────────────────────────────────────────

proptest! {
    #[test]
    fn gated_values_are_announced_or_back_filled(axis in arb_axis(), events in arb_points()) {
        let raw = events.clone();
        let series = build_series(events);
        let universe = Universe::from_series(&series);
        let panel = PanelAligner::new(&axis, &universe).unwrap().announcement_gated(&series).unwrap();

        for (col, entity) in universe.iter().enumerate() {
            let mine: Vec<&PointEvent<f64>> =
                raw.iter().filter(|(e, _)| e == entity).map(|(_, p)| p).collect();
            let first_visible = axis
                .iter()
                .position(|d| mine.iter().any(|p| p.announced <= *d));

            for (row, d) in axis.iter().enumerate() {
                let cell = panel.get_at(row, col);
                match first_visible {
                    None => prop_assert_eq!(cell, None),
                    Some(first) if row >= first => {
                        let v = cell.copied().unwrap();
                        prop_assert!(
                            mine.iter().any(|p| p.value == v && p.announced <= *d),
                            "value {} on {} was not yet announced", v, d
                        );
                    }
                    Some(first) => {
                        prop_assert_eq!(cell, panel.get_at(first, col));
                    }
                }
            }
        }
    }
}

// ── 6. Duplicate removal ─────────────────────────────────────────────

proptest! {
    #[test]
    fn duplicate_events_collapse(events in arb_points()) {
        let mut doubled = events.clone();
        doubled.extend(events.iter().cloned());
        let once = build_series(events);
        let twice = build_series(doubled);
        prop_assert_eq!(event_count(&once), event_count(&twice));
        prop_assert_eq!(once, twice);
    }
}

//! Criterion benchmarks for the panel engine hot paths.
//!
//! Benchmarks:
//! 1. Interval membership over a multi-year axis
//! 2. Forward-fill of monthly snapshots
//! 3. Announcement-gated alignment
//! 4. Ratio transform

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use refdata_core::data::{CalendarProvider, WeekdayCalendar};
use refdata_core::domain::{EntityId, TradingDate};
use refdata_core::panel::{
    build_series, to_ratio, IntervalEvent, PanelAligner, PointEvent, SeriesMap, Universe,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn axis() -> Vec<TradingDate> {
    WeekdayCalendar::new()
        .trading_dates(
            TradingDate::from_int(20150101).unwrap(),
            TradingDate::from_int(20201231).unwrap(),
        )
        .unwrap()
}

fn entity(j: usize) -> EntityId {
    EntityId::new(format!("{:06}.SH", 600000 + j))
}

fn make_intervals(dates: &[TradingDate], n: usize) -> SeriesMap<IntervalEvent> {
    let events = (0..n).flat_map(|j| {
        let a = dates[(j * 37) % dates.len()];
        let b = dates[(j * 37 + 200) % dates.len()];
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        [
            (entity(j), IntervalEvent::new(lo, hi)),
            (entity(j), IntervalEvent::new(hi, TradingDate::OPEN_END)),
        ]
    });
    build_series(events)
}

fn make_snapshots(dates: &[TradingDate], n: usize) -> SeriesMap<PointEvent<f64>> {
    let events = dates.iter().step_by(21).enumerate().flat_map(|(k, d)| {
        (0..n).map(move |j| {
            let w = ((j * 31 + k * 7) % 100) as f64 / 1000.0;
            (entity(j), PointEvent::new(*d, w))
        })
    });
    build_series(events)
}

fn make_announced(dates: &[TradingDate], n: usize) -> SeriesMap<PointEvent<String>> {
    let events = (0..n).flat_map(move |j| {
        (0..4).map(move |k| {
            let eff = dates[(j * 13 + k * 300) % dates.len()];
            let ann = dates[((j * 13 + k * 300) + 5).min(dates.len() - 1)];
            (entity(j), PointEvent::announced_at(eff, ann, format!("{}0000", 11 + k)))
        })
    });
    build_series(events)
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_membership(c: &mut Criterion) {
    let dates = axis();
    let mut group = c.benchmark_group("membership");
    for n in [50usize, 500] {
        let series = make_intervals(&dates, n);
        let universe = Universe::from_series(&series);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let aligner = PanelAligner::new(&dates, &universe).unwrap();
                black_box(aligner.membership(black_box(&series)).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_forward_fill(c: &mut Criterion) {
    let dates = axis();
    let mut group = c.benchmark_group("forward_fill");
    for n in [50usize, 500] {
        let series = make_snapshots(&dates, n);
        let universe = Universe::from_series(&series);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let aligner = PanelAligner::new(&dates, &universe).unwrap();
                black_box(aligner.forward_fill(black_box(&series), Some(0.0)).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_announcement_gated(c: &mut Criterion) {
    let dates = axis();
    let series = make_announced(&dates, 300);
    let universe = Universe::from_series(&series);
    c.bench_function("announcement_gated_300", |b| {
        b.iter(|| {
            let aligner = PanelAligner::new(&dates, &universe).unwrap();
            black_box(aligner.announcement_gated(black_box(&series)).unwrap())
        })
    });
}

fn bench_ratio(c: &mut Criterion) {
    let dates = axis();
    let series = make_snapshots(&dates, 300);
    let universe = Universe::from_series(&series);
    let panel = PanelAligner::new(&dates, &universe)
        .unwrap()
        .forward_fill(&series, Some(1.0))
        .unwrap();
    c.bench_function("to_ratio_300", |b| b.iter(|| black_box(to_ratio(black_box(&panel)))));
}

criterion_group!(
    benches,
    bench_membership,
    bench_forward_fill,
    bench_announcement_gated,
    bench_ratio
);
criterion_main!(benches);

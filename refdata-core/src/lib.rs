//! refdata core: point-in-time reference-data panels.
//!
//! Turns sparse, event-dated reference records into dense date × entity
//! panels on a trading calendar without look-ahead:
//! - Domain types (trading dates, entity ids, raw records)
//! - Fetch seam, typed query builder, trading calendars, CSV record store
//! - Event series, universe resolution and the panel aligner
//! - Adjustment ratio transform and the on-disk panel cache
//! - `DataService`: index weights and membership, industry classification,
//!   adjustment factors, and thin market/fundamental delegations

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod panel;
pub mod service;

pub use config::{IndustryKind, RefDataConfig, ServiceConfig};
pub use error::{RefDataError, Result};
pub use service::{DataService, QueryOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: panels, series and the service are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::TradingDate>();
        require_sync::<domain::TradingDate>();
        require_send::<domain::Record>();
        require_sync::<domain::Record>();

        require_send::<panel::WeightPanel>();
        require_sync::<panel::WeightPanel>();
        require_send::<panel::IndustryPanel>();
        require_sync::<panel::IndustryPanel>();
        require_send::<panel::SeriesMap<panel::PointEvent<f64>>>();
        require_sync::<panel::SeriesMap<panel::PointEvent<f64>>>();
        require_send::<panel::PanelCache>();
        require_sync::<panel::PanelCache>();

        require_send::<DataService<data::CsvRecordFetcher, data::StaticCalendar>>();
        require_sync::<DataService<data::CsvRecordFetcher, data::StaticCalendar>>();
        require_send::<DataService<data::CsvRecordFetcher, data::WeekdayCalendar>>();
        require_sync::<DataService<data::CsvRecordFetcher, data::WeekdayCalendar>>();
    }

    /// The panel engine never sees the fetch seam: alignment is a pure
    /// function of (dates, universe, series).
    #[test]
    fn aligner_is_independent_of_fetching() {
        fn _check(
            dates: &[domain::TradingDate],
            universe: &panel::Universe,
            series: &panel::SeriesMap<panel::IntervalEvent>,
        ) -> Result<panel::MembershipPanel> {
            panel::PanelAligner::new(dates, universe)?.membership(series)
        }
    }
}

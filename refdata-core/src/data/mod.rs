//! Record sources, trading calendars, and row handling

pub mod calendar;
pub mod canonicalize;
pub mod csv_source;
pub mod provider;
pub mod query;
pub mod schema;

pub use calendar::{CalendarProvider, StaticCalendar, WeekdayCalendar};
pub use canonicalize::Canonicalizer;
pub use csv_source::{CsvRecordFetcher, ViewLayout};
pub use provider::{FetchResponse, FetchStatus, RawRecordFetcher};
pub use query::{views, FieldList, Filter, Query};
pub use schema::ViewSchema;

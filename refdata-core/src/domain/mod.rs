//! Domain types: trading dates, entity ids, raw records.

pub mod date;
pub mod ids;
pub mod record;

pub use date::{SnapshotPeriod, TradeTime, TradingDate};
pub use ids::{EntityId, SymbolList};
pub use record::{FieldValue, Record, RowContext};

//! Point-in-time panel engine: event series, universe, alignment,
//! adjustment transform and the panel cache.

pub mod adjust;
pub mod align;
pub mod cache;
pub mod dense;
pub mod series;
pub mod universe;

pub use adjust::{cumulate, to_ratio};
pub use align::{series_from_panel, FillPolicy, PanelAligner};
pub use cache::{PanelCache, PanelKey, PanelMeta};
pub use dense::{
    DensePanel, FactorPanel, IndustryPanel, MembershipPanel, PanelValue, WeightPanel, DATE_COLUMN,
};
pub use series::{build_series, event_count, Event, EventSeries, IntervalEvent, PointEvent, SeriesMap};
pub use universe::Universe;

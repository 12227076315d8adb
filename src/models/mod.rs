mod price_record;
mod intent;

pub use price_record::{
    AggregateMetrics, Bounds, ConsolidatedRow, DateRange, Direction, ExtremumField,
    NormalizedRecord, PriceFilter, PriceRecord,
};
pub use intent::{Intent, ResolvedQuery};

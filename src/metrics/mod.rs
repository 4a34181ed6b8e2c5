//! Metrics module
//!
//! Reads per-node set occupancy and TTL histograms through the info protocol.

pub mod parser;
mod watcher;

pub use parser::{
    histogram_query, parse_histogram, parse_set_record, parse_sets, tokenize, AgeHistogram,
    Fields, SetFilter, SetOccupancy, SETS_QUERY,
};
pub use watcher::{MetricsWatcher, WatcherConfig};

//! Evictor module
//!
//! Turns the merged per-pass plan into remove-by-age calls.

mod dispatcher;
mod plan;

pub use dispatcher::{
    DispatchReport, DispatchResult, DispatchStatus, DispatcherConfig, EvictionDispatcher,
    DEFAULT_CALL_TIMEOUT,
};
pub use plan::{EvictionDecision, EvictionPlan};

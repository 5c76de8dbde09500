//! Pipeline and hub statistics

pub mod metrics;

pub use metrics::{HubCounters, HubStats, PipelineCounters, PipelineStats};

//! Per-user health readings and the timeline summary built from them.

pub mod store;
pub mod timeline;

pub use store::MetricStore;

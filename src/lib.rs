//! promdict - Prometheus metrics aggregated across workers through a shared store
//!
//! Workers record counters, gauges and histograms into one shared key/value
//! store. Counters and histograms are buffered per worker and flushed
//! periodically; a replicated key catalog lets any worker enumerate every
//! live series cheaply and render the Prometheus text exposition.

pub mod buffer;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod handlers;
pub mod lookup;
pub mod middleware;
pub mod naming;
pub mod registry;
pub mod simulate;
pub mod store;
pub mod telemetry;
pub mod worker;

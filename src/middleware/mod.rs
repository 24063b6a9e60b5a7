//! Request middleware for the demo server

mod instrument;

pub use instrument::{WorkerId, record_requests, track_connections};

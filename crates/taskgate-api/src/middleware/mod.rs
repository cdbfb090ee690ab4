//! HTTP middleware shared by all routes
//!
//! Author: hephaex@gmail.com

pub mod metrics;

pub use metrics::metrics_middleware;

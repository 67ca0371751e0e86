//! Library crate for port-probe-rs exposing reusable modules.
pub mod banner;
pub mod error;
pub mod mem;
pub mod metrics;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod targets;
pub mod types;

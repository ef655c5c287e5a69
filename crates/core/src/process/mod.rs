//! Payload processing: schema gate, item extraction, entity log diffing

pub mod diff;
pub mod ports;
pub mod service;

pub use diff::{compute_diff, LogDiff};
pub use ports::{EntityLogRepository, UpdateRepository};
pub use service::ProcessService;

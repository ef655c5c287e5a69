//! Integration update read and acknowledgement

pub mod service;

pub use service::UpdateService;

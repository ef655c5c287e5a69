//! Remote data fetching

pub mod ports;
pub mod service;

pub use ports::{FetchFailure, FetchResponse, HttpFetcher, UserDirectory};
pub use service::FetchService;

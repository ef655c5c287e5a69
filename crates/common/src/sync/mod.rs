//! Async coordination primitives
//!
//! - **`singleflight`**: collapse concurrent calls sharing a key into one
//!   execution

pub mod singleflight;

pub use singleflight::SingleFlight;

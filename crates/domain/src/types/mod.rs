//! Domain data types

pub mod definition;
pub mod integration;

pub use definition::*;
pub use integration::*;

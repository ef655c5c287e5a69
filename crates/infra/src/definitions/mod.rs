//! Integration definition catalogue sources

pub mod file_source;

pub use file_source::FileDefinitionSource;

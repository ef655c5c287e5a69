//! User directory adapters

pub mod http_directory;

pub use http_directory::HttpUserDirectory;

pub mod registry;
pub mod traits;

// Source adapters
pub mod fx;
pub mod html_source;
pub mod sources;

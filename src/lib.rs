pub mod config;
pub mod error;
pub mod import;
pub mod records;
pub mod scoring;
pub mod telemetry;

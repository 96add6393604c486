//! Data models: the extracted W-2 record and pipeline configuration.

pub mod config;
pub mod w2;

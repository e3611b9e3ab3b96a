//! Shared types and utilities for gpumon
//!
//! This crate contains the data model handed from the collector to the report
//! aggregator, plus the formatting helpers every report format shares so that
//! all renderings present identical numbers.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{record::*, report::*};

//! Core types, traits, and utilities for vibeclock
//!
//! This crate provides the normalized session model, the reader trait every
//! source crate implements, timestamp normalization, aggregation data types,
//! timezone handling, and the shared error type.

pub mod accumulator;
pub mod aggregation_types;
pub mod error;
pub mod provider;
pub mod timestamp;
pub mod timezone;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use error::{Result, VibeclockError};
pub use types::{ModelName, ModelUsage, Session, SessionBuilder, SessionId, Source, TokenCounts};
pub use provider::{CollectReport, Collection, SessionReader, SkippedFile};
pub use timezone::TimezoneConfig;

//! # finsync-core
//!
//! Core types, traits, and abstractions for the finsync pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other finsync crates depend on.

pub mod cron;
pub mod defaults;
pub mod environment;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod transform;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use cron::{daily_tag, six_hourly_expression, CronTag};
pub use environment::ExecutionEnvironment;
pub use error::{Error, ProviderErrorKind, Result};
pub use models::*;
pub use traits::*;
pub use transform::{dedup_key, embedding_text, transform_transaction};
pub use uuid_utils::new_v7;

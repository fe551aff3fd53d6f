//! # finsync-providers
//!
//! Banking engine client for finsync.
//!
//! All upstream providers (Plaid, GoCardless, Teller, Enable Banking) sit
//! behind one engine API; this crate talks to it and classifies every
//! failure into a closed [`finsync_core::ProviderErrorKind`] before it
//! reaches the pipeline.

pub mod engine;
pub mod mock;
pub mod types;

pub use engine::{EngineClient, DEFAULT_ENGINE_URL};
pub use mock::MockBankProvider;

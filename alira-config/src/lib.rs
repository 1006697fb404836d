//! Configuration for Alira turns and providers.
//!
//! [`schema`] holds the typed settings with their defaults; [`loader`] reads
//! them from JSON files and environment overrides.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ENV_DEFAULT_MODEL, ENV_LOG, ENV_TURN_TIMEOUT_SECS};
pub use schema::{AliraConfig, CallSiteParams, OpenAiSettings, TurnSettings};

//! Tool-orchestration runtime for function-calling language models.
//!
//! This facade bundles the Alira crates behind feature flags. Enabling
//! `kernel` pulls in everything a turn needs.

#![warn(missing_docs, clippy::pedantic)]

/// Shared identifiers and function specs.
pub use alira_primitives as primitives;

/// Turn orchestration (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use alira_kernel as kernel;

/// Model adapters (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use alira_adapters as adapters;

/// Tool registry, discovery and credentials (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use alira_tools as tools;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use alira_telemetry as telemetry;

/// Prompt templates (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use alira_prompts as prompts;

/// Configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use alira_config as config;

//! Observability utilities for Alira.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support {
    //! Structured tracing helpers.

    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Builds the filter: `RUST_LOG` wins, otherwise `default_filter`.
    ///
    /// # Errors
    ///
    /// Returns an error when `default_filter` is not a valid directive.
    pub fn env_filter(default_filter: &str) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(default_filter)
                .with_context(|| format!("invalid log filter `{default_filter}`")),
        }
    }

    /// Installs the global `fmt` subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error when the filter is invalid or a global subscriber is
    /// already installed.
    pub fn init(default_filter: &str) -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(default_filter)?)
            .with_target(true)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err))
            .context("failed to install tracing subscriber")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_invalid_default_filter() {
            if std::env::var_os("RUST_LOG").is_none() {
                assert!(env_filter("alira=[").is_err());
                assert!(env_filter("alira=debug").is_ok());
            }
        }
    }
}

pub use tracing_support::init;

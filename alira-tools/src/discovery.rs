//! Startup discovery of tools from pluggable sources.

use tracing::{info, warn};

use crate::registry::{ToolDefinition, ToolError, ToolRegistry, ToolResult};

/// A named origin of candidate tool definitions.
///
/// Loading may fail as a whole (for example when a plugin directory is
/// unreadable); individual candidates are validated on registration.
pub trait ToolSource: Send + Sync {
    /// Returns a label used in logs and reports.
    fn name(&self) -> &str;

    /// Loads the candidate definitions offered by this source.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be read at all.
    fn load(&self) -> ToolResult<Vec<ToolDefinition>>;
}

/// Source backed by a fixed set of definitions known at build time.
#[derive(Debug)]
pub struct StaticSource {
    name: String,
    definitions: Vec<ToolDefinition>,
}

impl StaticSource {
    /// Creates a source from the supplied definitions.
    #[must_use]
    pub fn new(name: impl Into<String>, definitions: Vec<ToolDefinition>) -> Self {
        Self {
            name: name.into(),
            definitions,
        }
    }
}

impl ToolSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> ToolResult<Vec<ToolDefinition>> {
        Ok(self.definitions.clone())
    }
}

/// Summary of a discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    registered: Vec<String>,
    rejected: Vec<ToolError>,
}

impl DiscoveryReport {
    /// Names registered during the pass, in registration order.
    #[must_use]
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Sources and candidates that failed.
    #[must_use]
    pub fn rejected(&self) -> &[ToolError] {
        &self.rejected
    }
}

/// Registers every candidate offered by `sources`.
///
/// A failing source or candidate is logged and recorded; the remaining
/// candidates still register.
pub fn discover<'a, I>(registry: &mut ToolRegistry, sources: I) -> DiscoveryReport
where
    I: IntoIterator<Item = &'a dyn ToolSource>,
{
    let mut report = DiscoveryReport::default();

    for source in sources {
        let candidates = match source.load() {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(source = source.name(), error = %err, "failed to load tool source");
                report.rejected.push(match err {
                    ToolError::Source { .. } => err,
                    other => ToolError::Source {
                        source_name: source.name().to_owned(),
                        reason: other.to_string(),
                    },
                });
                continue;
            }
        };

        info!(source = source.name(), candidates = candidates.len(), "loading tools");
        for candidate in candidates {
            let name = candidate.name().to_owned();
            match registry.register(candidate) {
                Ok(()) => report.registered.push(name),
                Err(err) => {
                    warn!(source = source.name(), error = %err, "skipping tool candidate");
                    report.rejected.push(err);
                }
            }
        }
    }

    info!(total = registry.len(), "tool discovery complete");
    report
}

//! Reporting agent identification.

use std::fmt;

/// Agent name the host-side parser expects in the `agent=` field.
pub const AGENT_NAME: &str = "Cloud-Init";

/// `<name>/<version>` tag identifying the reporting agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTag {
    pub name: String,
    pub version: String,
}

impl AgentTag {
    /// Tag with the standard agent name and a given version.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            name: AGENT_NAME.to_string(),
            version: version.into(),
        }
    }

    /// Tag for the running build.
    pub fn current() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

impl Default for AgentTag {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for AgentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

//! Server configuration.

use crate::error::Error;
use crate::error::Result;

/// Subprotocol token peers must negotiate.
pub const DEFAULT_SUBPROTOCOL: &str = "westfield";

/// Upper bound for one inbound binary payload.
pub const DEFAULT_MAX_PAYLOAD: usize = 1 << 20;

/// Settings shared by every connection of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    subprotocol: String,
    max_payload_size: usize,
    error_event: bool,
}

impl Config {
    pub fn new() -> Self {
        Self {
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            error_event: true,
        }
    }

    /// Reads overrides from `WESTRUN_SUBPROTOCOL` and `WESTRUN_MAX_PAYLOAD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new();

        if let Some(subprotocol) = lookup("WESTRUN_SUBPROTOCOL") {
            if subprotocol.is_empty() {
                return Err(Error::Config("WESTRUN_SUBPROTOCOL is empty".into()));
            }
            config.subprotocol = subprotocol;
        }

        if let Some(max) = lookup("WESTRUN_MAX_PAYLOAD") {
            config.max_payload_size = max
                .parse()
                .map_err(|_| Error::Config(format!("WESTRUN_MAX_PAYLOAD is not a size: '{}'", max)))?;
        }

        Ok(config)
    }

    pub fn subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = subprotocol.into();
        self
    }

    pub fn max_payload_size(mut self, limit: usize) -> Self {
        self.max_payload_size = limit;
        self
    }

    /// Whether violations are reported in-band with an error event before closing.
    pub fn error_event(mut self, enabled: bool) -> Self {
        self.error_event = enabled;
        self
    }

    pub fn expected_subprotocol(&self) -> &str {
        &self.subprotocol
    }

    pub fn payload_limit(&self) -> usize {
        self.max_payload_size
    }

    pub fn reports_errors(&self) -> bool {
        self.error_event
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

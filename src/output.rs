use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// How status lines for one item are presented.
///
/// Passed down explicitly to everything that reports progress, so concurrent
/// batch items each carry their own prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayOptions {
    /// Item name shown in front of every message (batch mode)
    pub prefix: Option<String>,
    /// Let external tools write straight to the terminal
    pub verbose: bool,
    /// Show a spinner while an external tool runs
    pub dynamic: bool,
}

impl DisplayOptions {
    /// Options for an interactive single-item run
    pub fn interactive(verbose: bool) -> Self {
        Self {
            prefix: None,
            verbose,
            // Tool output and a spinner would fight over the terminal
            dynamic: !verbose,
        }
    }

    /// Options for one item of a batch run
    pub fn for_item(name: impl Into<String>) -> Self {
        Self {
            prefix: Some(name.into()),
            verbose: false,
            dynamic: false,
        }
    }

    pub fn show_spinner(&self) -> bool {
        self.dynamic && !self.verbose
    }

    /// Prepend the item prefix, if any
    pub fn tag(&self, msg: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}: {}", prefix, msg),
            None => msg.to_string(),
        }
    }

    pub fn progress(&self, msg: &str) {
        info!("[=] {}", self.tag(msg));
    }

    pub fn good(&self, msg: &str) {
        info!("[✓] {}", self.tag(msg));
    }

    pub fn warn(&self, msg: &str) {
        warn!("[?] {}", self.tag(msg));
    }

    pub fn fail(&self, msg: &str) {
        error!("[✗] {}", self.tag(msg));
    }
}

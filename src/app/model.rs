// Defines the core data structures for the application.

use serde::Deserialize;

/// A database engine we know how to look for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineDescriptor {
    pub name: String,
    /// Candidate unit-name prefixes, tried in order.
    pub unit_prefixes: Vec<String>,
    /// Expected executable name. Informational only.
    #[serde(default)]
    pub process_pattern: String,
}

impl EngineDescriptor {
    pub fn new(name: &str, unit_prefixes: &[&str], process_pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            unit_prefixes: unit_prefixes.iter().map(|p| p.to_string()).collect(),
            process_pattern: process_pattern.to_string(),
        }
    }
}

/// Classification of the raw `systemctl is-active` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
    Failed,
    Other,
}

impl ServiceState {
    pub fn from_status(status: &str) -> Self {
        match status {
            "active" => ServiceState::Active,
            "inactive" => ServiceState::Inactive,
            "failed" => ServiceState::Failed,
            _ => ServiceState::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
}

impl ControlAction {
    /// The control a row offers for a given state.
    pub fn for_state(state: ServiceState) -> Self {
        match state {
            ServiceState::Active => ControlAction::Stop,
            ServiceState::Inactive | ServiceState::Failed => ControlAction::Start,
            ServiceState::Other => ControlAction::Restart,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ControlAction::Start => "Start",
            ControlAction::Stop => "Stop",
            ControlAction::Restart => "Restart",
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Restart => "restart",
        }
    }
}

/// What a row does after issuing a privileged lifecycle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionMode {
    /// Ignore the command's outcome; the next refresh tells the story.
    #[default]
    FireAndForget,
    /// Report a failed or denied command after refreshing.
    Verify,
}

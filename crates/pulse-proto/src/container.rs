//! Container listing and lifecycle actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// One running container as shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Short (12 character) container id.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Human readable status (e.g. "Up 3 hours").
    pub status: String,
    /// Published ports, e.g. `8080:tcp/80`, or `N/A`.
    pub ports: String,
    /// Engine state (e.g. "running").
    pub state: String,
}

impl Container {
    /// Truncate a full engine id to its short form.
    #[must_use]
    pub fn short_id(id: &str) -> String {
        id.chars().take(12).collect()
    }
}

/// Lifecycle action an operator can apply to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    /// Start a stopped container.
    Start,
    /// Stop a running container.
    Stop,
    /// Restart a container.
    Restart,
}

impl ContainerAction {
    /// Lowercase action name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerAction {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            _ => Err(ProtoError::InvalidAction(s.to_string())),
        }
    }
}

/// Outcome of a container action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Whether the engine accepted the action.
    pub success: bool,
    /// Human readable detail.
    pub message: String,
}

impl ActionResponse {
    /// Successful action on a container.
    #[must_use]
    pub fn done(action: ContainerAction, id: &str) -> Self {
        let verb = match action {
            ContainerAction::Start => "started",
            ContainerAction::Stop => "stopped",
            ContainerAction::Restart => "restarted",
        };
        Self {
            success: true,
            message: format!("container {id} {verb}"),
        }
    }

    /// Failed action with the engine's reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("start", ContainerAction::Start)]
    #[test_case("STOP", ContainerAction::Stop)]
    #[test_case(" restart ", ContainerAction::Restart)]
    fn test_parse_action(input: &str, expected: ContainerAction) {
        assert_eq!(input.parse::<ContainerAction>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_action() {
        let err = "kill".parse::<ContainerAction>().unwrap_err();
        assert!(err.to_string().contains("kill"));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(Container::short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(Container::short_id("abc"), "abc");
    }

    #[test]
    fn test_action_response_messages() {
        let ok = ActionResponse::done(ContainerAction::Restart, "abc");
        assert!(ok.success);
        assert_eq!(ok.message, "container abc restarted");

        let failed = ActionResponse::failed("no such container");
        assert!(!failed.success);
    }
}

//! Inbound command handling
//!
//! Payloads arriving on the config and command topics are plain text,
//! matched against a closed command table. Unrecognized payloads map to a
//! diagnostic action rather than an error, so a misbehaving publisher
//! cannot wedge the device.

use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to run shell action: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Shell action exited with status {code:?}")]
    ExitStatus { code: Option<i32> },
}

/// Closed set of actions a device accepts over its inbound topics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    TestCommand,
    Reboot,
    Update,
    /// Anything outside the table; maps to a diagnostic echo
    Unknown,
}

impl DeviceCommand {
    /// Exact-match lookup; payloads are case sensitive
    pub fn parse(payload: &str) -> Self {
        match payload {
            "TEST COMMAND" => Self::TestCommand,
            "REBOOT" => Self::Reboot,
            "UPDATE" => Self::Update,
            _ => Self::Unknown,
        }
    }

    /// Shell action behind each command
    pub fn shell_action(&self) -> &'static str {
        match self {
            Self::TestCommand => "echo 'Test command was received and executed successfully'",
            Self::Reboot => "sudo reboot now",
            Self::Update => "sudo apt update && sudo apt upgrade -y",
            Self::Unknown => "echo 'Invalid Command'",
        }
    }
}

/// Maps an inbound payload to an executable action
///
/// Dispatch is synchronous by contract: the payload is fully consumed
/// before the next broker event is pumped.
pub trait CommandDispatcher: Send {
    fn dispatch(&self, payload: &str) -> Result<(), DispatchError>;
}

/// Dispatcher that runs the mapped action through `sh -c`
pub struct ShellCommandDispatcher;

impl CommandDispatcher for ShellCommandDispatcher {
    fn dispatch(&self, payload: &str) -> Result<(), DispatchError> {
        let command = DeviceCommand::parse(payload);
        info!(command = ?command, "dispatching inbound command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command.shell_action())
            .output()?;

        if !output.stdout.is_empty() {
            debug!(
                stdout = %String::from_utf8_lossy(&output.stdout).trim_end(),
                "shell action output"
            );
        }

        if !output.status.success() {
            warn!(
                command = ?command,
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "shell action failed"
            );
            return Err(DispatchError::ExitStatus {
                code: output.status.code(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_payloads_map_to_commands() {
        assert_eq!(DeviceCommand::parse("TEST COMMAND"), DeviceCommand::TestCommand);
        assert_eq!(DeviceCommand::parse("REBOOT"), DeviceCommand::Reboot);
        assert_eq!(DeviceCommand::parse("UPDATE"), DeviceCommand::Update);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(DeviceCommand::parse("reboot"), DeviceCommand::Unknown);
        assert_eq!(DeviceCommand::parse("Test Command"), DeviceCommand::Unknown);
    }

    #[test]
    fn test_unknown_payload_maps_to_diagnostic_action() {
        let command = DeviceCommand::parse("unknown-xyz");
        assert_eq!(command, DeviceCommand::Unknown);
        assert_eq!(command.shell_action(), "echo 'Invalid Command'");
    }

    #[test]
    fn test_actions_match_command_table() {
        assert_eq!(
            DeviceCommand::TestCommand.shell_action(),
            "echo 'Test command was received and executed successfully'"
        );
        assert_eq!(DeviceCommand::Reboot.shell_action(), "sudo reboot now");
        assert_eq!(
            DeviceCommand::Update.shell_action(),
            "sudo apt update && sudo apt upgrade -y"
        );
    }

    #[test]
    fn test_shell_dispatcher_runs_test_command() {
        let dispatcher = ShellCommandDispatcher;
        dispatcher.dispatch("TEST COMMAND").unwrap();
    }

    #[test]
    fn test_shell_dispatcher_accepts_unknown_payloads() {
        // The diagnostic echo exits zero, so unknown payloads never error
        let dispatcher = ShellCommandDispatcher;
        dispatcher.dispatch("definitely-not-a-command").unwrap();
    }
}

//! Closed command set exposed to the hosted application
//!
//! Bridge payloads name a method; parsing maps the name onto this enum so
//! unknown methods are rejected at the boundary instead of dispatched.

use crate::error::{KioskError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A command the hosted application may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "method")]
pub enum KioskCommand {
    EnableLockdown,
    DisableLockdown,
    ForceFallbackMode,
    IsInFallbackMode,
}

impl KioskCommand {
    pub const ALL: [KioskCommand; 4] = [
        KioskCommand::EnableLockdown,
        KioskCommand::DisableLockdown,
        KioskCommand::ForceFallbackMode,
        KioskCommand::IsInFallbackMode,
    ];

    /// Bridge method name
    pub fn method(&self) -> &'static str {
        match self {
            KioskCommand::EnableLockdown => "enableLockdown",
            KioskCommand::DisableLockdown => "disableLockdown",
            KioskCommand::ForceFallbackMode => "forceFallbackMode",
            KioskCommand::IsInFallbackMode => "isInFallbackMode",
        }
    }

    /// Parse a JSON bridge payload such as `{"method": "enableLockdown"}`
    ///
    /// A missing or unknown method is `UnknownCommand`; malformed JSON is
    /// a serialization error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            if e.is_data() {
                KioskError::UnknownCommand(e.to_string())
            } else {
                KioskError::Serialization(e)
            }
        })
    }
}

impl FromStr for KioskCommand {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self> {
        KioskCommand::ALL
            .into_iter()
            .find(|cmd| cmd.method() == s)
            .ok_or_else(|| KioskError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for KioskCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Result of executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum KioskReply {
    /// The command was applied
    Ack,
    /// Answer to `IsInFallbackMode`
    FallbackMode(bool),
}

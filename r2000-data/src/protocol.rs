use std::collections::BTreeMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Live mirror of the scanner parameters, name to value.
pub type ParameterMap = BTreeMap<String, String>;

/// Command protocol description reported by the scanner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtocolInfo {
    pub protocol_name: String,
    pub version_major: i64,
    pub version_minor: i64,
    /// Names of the commands the device accepts.
    pub commands: Vec<String>,
}

impl ProtocolInfo {
    pub fn supports(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }
}

//! Actuator identifiers, commands and local on/off state.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Actuators wired to the installation.
pub const KNOWN_DEVICES: [&str; 5] = ["pump1", "pump2", "servo1", "servo2", "servo3"];

/// Identifier of an actuator, e.g. `pump1` or `servo3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap a device identifier.
    ///
    /// Identifiers end up in a URL path, so only 1-32 ASCII letters, digits,
    /// `-` and `_` are accepted.
    ///
    /// ```
    /// use aquasense_types::DeviceId;
    ///
    /// assert!(DeviceId::new("pump1").is_ok());
    /// assert!(DeviceId::new("../admin").is_err());
    /// assert!(DeviceId::new("").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> ParseResult<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= 32
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(id))
        } else {
            Err(ParseError::InvalidDeviceId(id))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the [`KNOWN_DEVICES`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        KNOWN_DEVICES.contains(&self.0.as_str())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceId::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DeviceId::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// Binary actuator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    On,
    Off,
}

impl DeviceAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::On => "on",
            DeviceAction::Off => "off",
        }
    }

    /// The on/off flag this action leaves the device in.
    #[must_use]
    pub fn is_on(&self) -> bool {
        matches!(self, DeviceAction::On)
    }

    /// The action that moves a device into state `on`.
    #[must_use]
    pub fn from_state(on: bool) -> Self {
        if on { DeviceAction::On } else { DeviceAction::Off }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(DeviceAction::On),
            "off" => Ok(DeviceAction::Off),
            other => Err(ParseError::InvalidAction(other.to_string())),
        }
    }
}

/// Backend acknowledgement of a control command.
///
/// The backend answers 2xx even when it refuses a command, so `status` has
/// to be checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl CommandAck {
    /// `true` if the backend reports the command as sent.
    ///
    /// An empty body (no `status`) counts as success; only an explicit
    /// non-`success` status is a refusal.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_empty() || self.status.eq_ignore_ascii_case("success")
    }
}

/// Local on/off flags per actuator.
///
/// There is no device-status query on the backend, so this is the last
/// successfully commanded state, not server truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    states: BTreeMap<DeviceId, bool>,
}

impl DeviceState {
    /// State with no devices at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            states: BTreeMap::new(),
        }
    }

    /// `true` if the device is on. Unknown devices read as off.
    #[must_use]
    pub fn is_on(&self, device: &DeviceId) -> bool {
        self.states.get(device).copied().unwrap_or(false)
    }

    /// Record the state a device was commanded into.
    pub fn set(&mut self, device: DeviceId, on: bool) {
        self.states.insert(device, on);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, bool)> {
        self.states.iter().map(|(id, on)| (id, *on))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for DeviceState {
    /// Every known device, all off.
    fn default() -> Self {
        let states = KNOWN_DEVICES
            .iter()
            .filter_map(|id| DeviceId::new(*id).ok())
            .map(|id| (id, false))
            .collect();
        Self { states }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_rejects_path_characters() {
        assert!(DeviceId::new("pump/1").is_err());
        assert!(DeviceId::new("pump 1").is_err());
        assert!(DeviceId::new("a".repeat(33)).is_err());
    }

    #[test]
    fn test_device_id_serde_validates() {
        let ok: DeviceId = serde_json::from_str("\"servo2\"").unwrap();
        assert_eq!(ok.as_str(), "servo2");
        assert!(serde_json::from_str::<DeviceId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("ON".parse::<DeviceAction>(), Ok(DeviceAction::On));
        assert_eq!("off".parse::<DeviceAction>(), Ok(DeviceAction::Off));
        assert!("toggle".parse::<DeviceAction>().is_err());
    }

    #[test]
    fn test_action_from_state() {
        assert_eq!(DeviceAction::from_state(true), DeviceAction::On);
        assert!(!DeviceAction::from_state(false).is_on());
    }

    #[test]
    fn test_ack_status() {
        let ok: CommandAck =
            serde_json::from_str(r#"{"status":"success","message":"sent"}"#).unwrap();
        assert!(ok.is_success());
        let refused: CommandAck =
            serde_json::from_str(r#"{"status":"error","message":"Unknown device: x"}"#).unwrap();
        assert!(!refused.is_success());
        let bare: CommandAck = serde_json::from_str("{}").unwrap();
        assert!(bare.is_success());
    }

    #[test]
    fn test_default_state_lists_known_devices_off() {
        let state = DeviceState::default();
        assert_eq!(state.len(), KNOWN_DEVICES.len());
        assert!(state.iter().all(|(_, on)| !on));
    }

    #[test]
    fn test_set_and_read() {
        let mut state = DeviceState::empty();
        let pump = DeviceId::new("pump1").unwrap();
        assert!(!state.is_on(&pump));
        state.set(pump.clone(), true);
        assert!(state.is_on(&pump));
    }
}

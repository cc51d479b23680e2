//! Actuator command dispatch with confirmed local state.
//!
//! The local on/off flag of a device flips only after the backend has
//! acknowledged the command. A failed or refused command leaves the state
//! untouched and is reported to the caller and on the event bus.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use aquasense_types::{CommandAck, DeviceAction, DeviceId, DeviceState};

use crate::api::AquaApi;
use crate::error::{Error, Result};
use crate::events::{ConsoleEvent, EventDispatcher};

/// Sends actuator commands and tracks the last confirmed state per device.
pub struct ControlDispatcher {
    api: Arc<dyn AquaApi>,
    state: watch::Sender<DeviceState>,
    events: EventDispatcher,
}

impl std::fmt::Debug for ControlDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlDispatcher")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl ControlDispatcher {
    /// Dispatcher starting with every known device off.
    pub fn new(api: Arc<dyn AquaApi>, events: EventDispatcher) -> Self {
        Self::with_state(api, events, DeviceState::default())
    }

    /// Dispatcher starting from `initial`.
    pub fn with_state(api: Arc<dyn AquaApi>, events: EventDispatcher, initial: DeviceState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { api, state, events }
    }

    /// Send `action` to `device`.
    ///
    /// On success the device's local flag is set to match `action`. On any
    /// failure, including a 2xx acknowledgement whose status is not
    /// `success`, the state is left unchanged and the error is returned.
    pub async fn send(&self, device: &DeviceId, action: DeviceAction) -> Result<CommandAck> {
        let outcome = match self.api.control(device, action).await {
            Ok(ack) if ack.is_success() => Ok(ack),
            Ok(ack) => {
                let message = if ack.message.is_empty() {
                    format!("Command '{action}' for {device} was refused")
                } else {
                    ack.message
                };
                Err(Error::rejected(200, message))
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(ack) => {
                self.state.send_modify(|state| state.set(device.clone(), action.is_on()));
                info!(%device, %action, "Command acknowledged");
                self.events.send(ConsoleEvent::CommandSucceeded {
                    device: device.clone(),
                    action,
                });
                Ok(ack)
            }
            Err(e) => {
                warn!(%device, %action, error = %e, "Command failed; device state unchanged");
                self.events.send(ConsoleEvent::CommandFailed {
                    device: device.clone(),
                    action,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Parse user input and send it. Malformed input is a
    /// [`Error::Validation`] and nothing is sent.
    pub async fn send_raw(&self, device: &str, action: &str) -> Result<CommandAck> {
        let device: DeviceId = device.parse()?;
        let action: DeviceAction = action.parse()?;
        self.send(&device, action).await
    }

    /// Send the opposite of the device's current local state.
    pub async fn toggle(&self, device: &DeviceId) -> Result<CommandAck> {
        let action = DeviceAction::from_state(!self.is_on(device));
        self.send(device, action).await
    }

    /// Last confirmed state of every device.
    pub fn state(&self) -> DeviceState {
        self.state.borrow().clone()
    }

    pub fn is_on(&self, device: &DeviceId) -> bool {
        self.state.borrow().is_on(device)
    }

    /// Watch device state.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state.subscribe()
    }
}

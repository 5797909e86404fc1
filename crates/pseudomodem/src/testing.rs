//! Out-of-band control surface for test harnesses
//!
//! Nothing here is reachable by a connection manager talking to the modem.
//! It lets a harness inspect everything at once and fake events the network
//! side would normally cause.

use mm_protocol::{
    interface, CoreError, InterfaceMap, ModemError, ModemState, PropertyValue, StateChangeReason,
};
use tracing::info;

use crate::signal::ModemSignal;
use crate::Modem;

/// An SMS delivered through [`Modem::receive_message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sender: String,
    pub content: String,
}

impl Modem {
    /// Every property on every interface
    pub fn all_properties(&self) -> InterfaceMap {
        self.properties().interfaces().clone()
    }

    /// Pretend the network delivered a text message
    pub fn receive_message(&mut self, sender: impl Into<String>, content: impl Into<String>) {
        let message = ReceivedMessage {
            sender: sender.into(),
            content: content.into(),
        };
        info!("{}: message from {}", self.path(), message.sender);
        self.emit(ModemSignal::MessageReceived {
            sender: message.sender.clone(),
            content: message.content.clone(),
        });
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ReceivedMessage] {
        &self.messages
    }

    /// Write any existing property, writable or not
    ///
    /// Values are still type-checked. Writing `State` goes through the normal
    /// state change and emits `StateChanged` with reason UNKNOWN.
    pub fn set_property_for_testing(
        &mut self,
        interface_name: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ModemError> {
        if interface_name == interface::MODEM && name == "State" {
            let current = self.get(interface_name, name)?;
            if !current.same_type(&value) {
                return Err(ModemError::core(
                    CoreError::InvalidArgs,
                    format!("State expects {}, got {}", current.type_name(), value.type_name()),
                ));
            }
            let state = value.as_i32().and_then(ModemState::from_i32).ok_or_else(|| {
                ModemError::core(
                    CoreError::InvalidArgs,
                    format!("{value:?} is not a modem state"),
                )
            })?;
            self.change_state(state, StateChangeReason::Unknown);
            return Ok(());
        }
        self.write_property(interface_name, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gsm3gpp;

    #[test]
    fn test_receive_message_is_stored_and_signalled() {
        let mut modem = Modem::new(Gsm3gpp::new());
        modem.receive_message("+15555550100", "hello");
        assert_eq!(modem.messages().len(), 1);
        assert_eq!(
            modem.drain_signals(),
            vec![ModemSignal::MessageReceived {
                sender: "+15555550100".into(),
                content: "hello".into(),
            }]
        );
    }

    #[test]
    fn test_state_override_emits_state_changed() {
        let mut modem = Modem::new(Gsm3gpp::new());
        modem
            .set_property_for_testing(interface::MODEM, "State", PropertyValue::I32(6))
            .unwrap();
        assert_eq!(modem.state(), ModemState::Enabled);
        assert_eq!(
            modem.drain_signals(),
            vec![ModemSignal::StateChanged {
                old: ModemState::Disabled,
                new: ModemState::Enabled,
                reason: StateChangeReason::Unknown,
            }]
        );
    }

    #[test]
    fn test_override_bypasses_writability_but_not_types() {
        let mut modem = Modem::new(Gsm3gpp::new());
        modem
            .set_property_for_testing(interface::MODEM, "Model", PropertyValue::from("X1"))
            .unwrap();
        assert_eq!(
            modem.all_properties()[interface::MODEM]["Model"],
            PropertyValue::from("X1")
        );

        let err = modem
            .set_property_for_testing(interface::MODEM, "Model", PropertyValue::U32(1))
            .unwrap_err();
        assert!(err.is(CoreError::InvalidArgs));
        let err = modem
            .set_property_for_testing(interface::MODEM, "State", PropertyValue::I32(99))
            .unwrap_err();
        assert!(err.is(CoreError::InvalidArgs));
    }
}

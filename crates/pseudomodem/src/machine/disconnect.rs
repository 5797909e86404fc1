//! Simple.Disconnect
//!
//! `"/"` tears down every active bearer; any other path names exactly one.
//! The modem drops back to Registered once no bearer is active.

use mm_protocol::{CoreError, ModemError, ModemState, StateChangeReason, ROOT_PATH};
use tracing::debug;

use super::{HandlerTable, Operation, Step};
use crate::lease::{CancelPolicy, OperationKind, Restore};
use crate::Modem;

pub enum DisconnectEvent {
    Released,
}

const HANDLERS: HandlerTable<DisconnectMachine> = &[
    (ModemState::Connected, DisconnectMachine::on_connected),
    (ModemState::Disconnecting, DisconnectMachine::on_disconnecting),
];

#[derive(Debug)]
pub struct DisconnectMachine {
    bearer: String,
    released: bool,
}

impl DisconnectMachine {
    pub fn new(bearer: impl Into<String>) -> Self {
        Self {
            bearer: bearer.into(),
            released: false,
        }
    }

    fn all_bearers(&self) -> bool {
        self.bearer == ROOT_PATH
    }

    fn on_connected(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if self.released {
            return Ok(Step::Done);
        }
        modem.change_state(ModemState::Disconnecting, StateChangeReason::UserRequested);
        Ok(Step::after(modem.timing().disconnect(), DisconnectEvent::Released))
    }

    fn on_disconnecting(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        let targets: Vec<String> = if self.all_bearers() {
            modem.active_bearers()
        } else {
            vec![self.bearer.clone()]
        };
        // The bearer may have been deleted while the link was released
        for path in targets {
            modem.deactivate_bearer(&path)?;
        }
        let next = if modem.has_active_bearers() {
            ModemState::Connected
        } else {
            ModemState::Registered
        };
        modem.change_state(next, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }
}

impl Operation for DisconnectMachine {
    type Event = DisconnectEvent;
    type Output = ();

    const KIND: OperationKind = OperationKind::Disconnect;

    fn start_states(&self) -> &'static [ModemState] {
        &[ModemState::Connected]
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HANDLERS
    }

    fn admit(&self, modem: &Modem) -> Result<(), ModemError> {
        if self.all_bearers() || modem.state() != ModemState::Connected {
            return Ok(());
        }
        match modem.bearer(&self.bearer) {
            Some(bearer) if bearer.is_connected() => Ok(()),
            _ => Err(ModemError::core(
                CoreError::NotFound,
                format!("No active bearer with path {}", self.bearer),
            )),
        }
    }

    fn on_event(&mut self, modem: &mut Modem, event: DisconnectEvent) -> Result<(), ModemError> {
        match event {
            DisconnectEvent::Released => {
                debug!("{}: link released", modem.path());
                self.released = true;
            }
        }
        Ok(())
    }

    fn rollback(&mut self, modem: &mut Modem) {
        if modem.state() == ModemState::Disconnecting {
            let back = if modem.has_active_bearers() {
                ModemState::Connected
            } else {
                ModemState::Registered
            };
            modem.change_state(back, StateChangeReason::Unknown);
        }
    }

    fn cancel_policy(&self) -> CancelPolicy {
        CancelPolicy {
            interruptible: &[ModemState::Disconnecting],
            restore: Restore::State(ModemState::Connected),
        }
    }

    fn finish(&mut self, _modem: &mut Modem) -> Result<(), ModemError> {
        Ok(())
    }
}

//! Power down from any enabled state
//!
//! Each handler peels off one layer: an active connection is disconnected, an
//! in-flight connect or registration is cancelled, the registration is
//! dropped, and finally the radio goes Disabling -> Disabled.

use mm_protocol::{
    CoreError, ModemError, ModemState, RegistrationState, StateChangeReason,
};
use tracing::debug;

use super::{HandlerTable, Operation, Step};
use crate::lease::OperationKind;
use crate::Modem;

pub enum DisableEvent {
    Disconnected,
    PoweredDown,
}

const HANDLERS: HandlerTable<DisableMachine> = &[
    (ModemState::Connected, DisableMachine::on_connected),
    (ModemState::Connecting, DisableMachine::on_connecting),
    (ModemState::Registered, DisableMachine::on_registered),
    (ModemState::Searching, DisableMachine::on_searching),
    (ModemState::Enabled, DisableMachine::on_enabled),
    (ModemState::Disabling, DisableMachine::on_disabling),
];

#[derive(Debug, Default)]
pub struct DisableMachine {
    powered_down: bool,
}

impl DisableMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_connected(&mut self, _modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        Ok(Step::call(|modem, done| {
            let done = done.map(|()| DisableEvent::Disconnected);
            modem.internal(|modem| {
                if let Err(rejected) = modem.disconnect(mm_protocol::ROOT_PATH, done) {
                    rejected.forward(modem);
                }
            });
        }))
    }

    fn on_connecting(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        modem.cancel_current(OperationKind::Connect);
        if modem.state() == ModemState::Connecting {
            modem.change_state(ModemState::Registered, StateChangeReason::UserRequested);
        }
        Ok(Step::Continue)
    }

    fn on_registered(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        match modem.unregister_with_network() {
            Ok(()) => {}
            Err(e) if e.is(CoreError::Unsupported) => {
                debug!("{}: {}", modem.path(), e);
            }
            Err(e) => return Err(e),
        }
        if modem.state() == ModemState::Registered {
            modem.change_state(ModemState::Enabled, StateChangeReason::UserRequested);
        }
        Ok(Step::Continue)
    }

    fn on_searching(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        modem.cancel_current(OperationKind::Register);
        if modem.state() == ModemState::Searching {
            clear_registration(modem);
            modem.change_state(ModemState::Enabled, StateChangeReason::UserRequested);
        }
        Ok(Step::Continue)
    }

    fn on_enabled(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        modem.cancel_current(OperationKind::Connect);
        modem.cancel_current(OperationKind::Register);
        modem.change_state(ModemState::Disabling, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }

    fn on_disabling(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if !self.powered_down {
            return Ok(Step::after(modem.timing().disable(), DisableEvent::PoweredDown));
        }
        clear_registration(modem);
        modem.change_state(ModemState::Disabled, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }
}

fn clear_registration(modem: &mut Modem) {
    if modem.registration_state().is_some() {
        if let Err(e) = modem.set_registration_state(RegistrationState::Idle) {
            debug!("{}: {}", modem.path(), e);
        }
    }
}

impl Operation for DisableMachine {
    type Event = DisableEvent;
    type Output = ();

    const KIND: OperationKind = OperationKind::Disable;

    fn start_states(&self) -> &'static [ModemState] {
        &[
            ModemState::Enabled,
            ModemState::Searching,
            ModemState::Registered,
            ModemState::Connecting,
            ModemState::Connected,
        ]
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HANDLERS
    }

    fn on_event(&mut self, _modem: &mut Modem, event: DisableEvent) -> Result<(), ModemError> {
        if let DisableEvent::PoweredDown = event {
            self.powered_down = true;
        }
        Ok(())
    }

    fn rollback(&mut self, modem: &mut Modem) {
        if modem.state() == ModemState::Disabling {
            modem.change_state(ModemState::Enabled, StateChangeReason::Unknown);
        }
    }

    fn finish(&mut self, _modem: &mut Modem) -> Result<(), ModemError> {
        Ok(())
    }
}

//! Power up: Disabled -> Enabling -> Enabled, then kick off automatic
//! registration in the background.

use mm_protocol::{ModemError, ModemState, PowerState, PropertyValue, StateChangeReason};
use tracing::debug;

use super::{HandlerTable, Operation, Step};
use crate::completion::Completion;
use crate::lease::{CancelPolicy, OperationKind, Restore};
use crate::Modem;

pub enum EnableEvent {
    PoweredUp,
}

const HANDLERS: HandlerTable<EnableMachine> = &[
    (ModemState::Disabled, EnableMachine::on_disabled),
    (ModemState::Enabling, EnableMachine::on_enabling),
];

#[derive(Debug, Default)]
pub struct EnableMachine {
    powered: bool,
}

impl EnableMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_disabled(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        modem.change_state(ModemState::Enabling, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }

    fn on_enabling(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if !self.powered {
            return Ok(Step::after(modem.timing().enable(), EnableEvent::PoweredUp));
        }
        modem.write_property(
            mm_protocol::interface::MODEM,
            "PowerState",
            PropertyValue::U32(PowerState::On.as_u32()),
        )?;
        modem.change_state(ModemState::Enabled, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }
}

impl Operation for EnableMachine {
    type Event = EnableEvent;
    type Output = ();

    const KIND: OperationKind = OperationKind::Enable;

    fn start_states(&self) -> &'static [ModemState] {
        &[ModemState::Disabled]
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HANDLERS
    }

    fn on_event(&mut self, _modem: &mut Modem, event: EnableEvent) -> Result<(), ModemError> {
        match event {
            EnableEvent::PoweredUp => self.powered = true,
        }
        Ok(())
    }

    fn rollback(&mut self, modem: &mut Modem) {
        if modem.state() == ModemState::Enabling {
            modem.change_state(ModemState::Disabled, StateChangeReason::Unknown);
        }
    }

    fn cancel_policy(&self) -> CancelPolicy {
        CancelPolicy {
            interruptible: &[ModemState::Enabling],
            restore: Restore::PreOperation,
        }
    }

    fn finish(&mut self, modem: &mut Modem) -> Result<(), ModemError> {
        let started = modem.internal(|modem| {
            modem.register_with_network(Completion::detached("automatic registration"))
        });
        if let Err(rejected) = started {
            debug!(
                "{}: automatic registration not started: {}",
                modem.path(),
                rejected.error
            );
        }
        Ok(())
    }
}

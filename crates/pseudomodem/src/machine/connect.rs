//! Simple.Connect
//!
//! Brings the modem from wherever it is up to Connected: enable if needed,
//! wait out any enable or registration already in flight, register if
//! needed, then link a bearer. The caller gets the bearer's object path.

use mm_protocol::{
    ConnectionError, CoreError, ModemError, ModemState, PropertyMap, StateChangeReason,
};
use tracing::{debug, info};

use super::{HandlerTable, Operation, Step};
use crate::bearer::bearer_properties_from;
use crate::lease::{CancelPolicy, OperationKind, Restore};
use crate::Modem;

pub enum ConnectEvent {
    Enabled,
    Registered,
    Linked,
}

const HANDLERS: HandlerTable<ConnectMachine> = &[
    (ModemState::Disabled, ConnectMachine::on_disabled),
    (ModemState::Enabling, ConnectMachine::on_settling),
    (ModemState::Searching, ConnectMachine::on_settling),
    (ModemState::Enabled, ConnectMachine::on_enabled),
    (ModemState::Registered, ConnectMachine::on_registered),
    (ModemState::Connecting, ConnectMachine::on_connecting),
];

#[derive(Debug)]
pub struct ConnectMachine {
    properties: PropertyMap,
    enable_requested: bool,
    register_requested: bool,
    linked: bool,
    bearer: Option<String>,
}

impl ConnectMachine {
    /// Connect with the bearer keys of `properties`; other keys are ignored
    pub fn new(properties: &PropertyMap) -> Self {
        Self {
            properties: bearer_properties_from(properties),
            enable_requested: false,
            register_requested: false,
            linked: false,
            bearer: None,
        }
    }

    fn on_disabled(&mut self, _modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if self.enable_requested {
            return Err(ModemError::core(CoreError::Failed, "Failed to enable modem."));
        }
        self.enable_requested = true;
        Ok(Step::call(|modem, done| {
            let done = done.map(|()| ConnectEvent::Enabled);
            modem.internal(|modem| {
                if let Err(rejected) = modem.enable(true, done) {
                    rejected.forward(modem);
                }
            });
        }))
    }

    /// Another operation is moving the modem; look again shortly
    fn on_settling(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        Ok(Step::Wait(modem.timing().poll()))
    }

    fn on_enabled(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if modem.leases().is_held(OperationKind::Register) {
            return Ok(Step::Wait(modem.timing().poll()));
        }
        if self.register_requested {
            return Err(ModemError::core(
                CoreError::Failed,
                "Failed to register to a network.",
            ));
        }
        self.register_requested = true;
        Ok(Step::call(|modem, done| {
            let done = done.map(|()| ConnectEvent::Registered);
            modem.internal(|modem| {
                if let Err(rejected) = modem.register_with_network(done) {
                    rejected.forward(modem);
                }
            });
        }))
    }

    fn on_registered(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        modem.change_state(ModemState::Connecting, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }

    fn on_connecting(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if !self.linked {
            return Ok(Step::after(modem.timing().connect(), ConnectEvent::Linked));
        }
        let path = match modem.find_bearer(&self.properties) {
            Some(path) => path,
            None => modem.create_bearer(self.properties.clone())?,
        };
        modem.activate_bearer(&path)?;
        info!("{}: connected on {}", modem.path(), path);
        self.bearer = Some(path);
        modem.change_state(ModemState::Connected, StateChangeReason::UserRequested);
        Ok(Step::Continue)
    }
}

impl Operation for ConnectMachine {
    type Event = ConnectEvent;
    type Output = String;

    const KIND: OperationKind = OperationKind::Connect;

    fn start_states(&self) -> &'static [ModemState] {
        &[
            ModemState::Disabled,
            ModemState::Enabling,
            ModemState::Enabled,
            ModemState::Searching,
            ModemState::Registered,
        ]
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HANDLERS
    }

    fn admit(&self, modem: &Modem) -> Result<(), ModemError> {
        let state = modem.state();
        if state == ModemState::Connected {
            return Err(ModemError::core(CoreError::Connected, "Already connected."));
        }
        if matches!(state, ModemState::Disabling | ModemState::Disconnecting)
            || modem.leases().is_held(OperationKind::Disable)
        {
            return Err(ModemError::core(
                CoreError::WrongState,
                format!("Cannot connect while modem is {state}"),
            ));
        }
        Ok(())
    }

    fn on_event(&mut self, modem: &mut Modem, event: ConnectEvent) -> Result<(), ModemError> {
        match event {
            ConnectEvent::Enabled => debug!("{}: connect: modem enabled", modem.path()),
            ConnectEvent::Registered => debug!("{}: connect: modem registered", modem.path()),
            ConnectEvent::Linked => self.linked = true,
        }
        Ok(())
    }

    fn rollback(&mut self, modem: &mut Modem) {
        if modem.state() == ModemState::Connecting {
            modem.change_state(ModemState::Registered, StateChangeReason::Unknown);
        }
    }

    fn cancel_policy(&self) -> CancelPolicy {
        CancelPolicy {
            interruptible: &[ModemState::Connecting],
            restore: Restore::State(ModemState::Registered),
        }
    }

    fn finish(&mut self, _modem: &mut Modem) -> Result<String, ModemError> {
        self.bearer.take().ok_or_else(|| {
            ModemError::connection(ConnectionError::NoCarrier, "Connect finished without a bearer.")
        })
    }
}


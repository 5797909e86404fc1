//! Automatic network registration
//!
//! Enabled -> Searching (scan) -> register with the first network found ->
//! Registered. An empty scan fails with `NoNetwork`; any other scan or
//! register error is handed back unchanged. Failure leaves the modem Enabled
//! with registration Idle.

use mm_protocol::{
    CoreError, MobileEquipmentError, ModemError, ModemState, RegistrationState,
    StateChangeReason,
};
use tracing::{debug, info};

use super::{HandlerTable, Operation, Step};
use crate::lease::{CancelPolicy, OperationKind, Restore};
use crate::network::Network;
use crate::Modem;

pub enum RegisterEvent {
    Scanned(Vec<Network>),
    Registered,
}

const HANDLERS: HandlerTable<RegisterMachine> = &[
    (ModemState::Enabled, RegisterMachine::on_enabled),
    (ModemState::Searching, RegisterMachine::on_searching),
];

#[derive(Debug, Default)]
pub struct RegisterMachine {
    networks: Option<Vec<Network>>,
    attempted: bool,
}

impl RegisterMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_enabled(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if self.networks.is_some() {
            return Err(ModemError::core(
                CoreError::Failed,
                "Registration fell back to Enabled after scanning.",
            ));
        }
        modem.set_registration_state(RegistrationState::Searching)?;
        modem.change_state(ModemState::Searching, StateChangeReason::UserRequested);
        Ok(Step::call(|modem, done| {
            modem.scan(done.map(RegisterEvent::Scanned));
        }))
    }

    fn on_searching(&mut self, modem: &mut Modem) -> Result<Step<Self>, ModemError> {
        if self.attempted {
            return Err(ModemError::core(
                CoreError::Failed,
                "Registration did not leave Searching.",
            ));
        }
        let networks = self.networks.as_deref().unwrap_or_default();
        // Scans list roaming networks before the home network; first wins.
        let Some(network) = networks.first() else {
            return Err(ModemError::mobile_equipment(
                MobileEquipmentError::NoNetwork,
                "No networks were found to register.",
            ));
        };
        info!(
            "{}: registering with {} ({})",
            modem.path(),
            network.operator_long,
            network.operator_code
        );
        self.attempted = true;
        let code = network.operator_code.clone();
        let name = network.operator_long.clone();
        Ok(Step::call(move |modem, done| {
            modem.register(&code, &name, done.map(|()| RegisterEvent::Registered));
        }))
    }
}

impl Operation for RegisterMachine {
    type Event = RegisterEvent;
    type Output = ();

    const KIND: OperationKind = OperationKind::Register;

    fn start_states(&self) -> &'static [ModemState] {
        &[ModemState::Enabled]
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HANDLERS
    }

    fn on_event(&mut self, modem: &mut Modem, event: RegisterEvent) -> Result<(), ModemError> {
        match event {
            RegisterEvent::Scanned(networks) => {
                debug!("{}: scan returned {} network(s)", modem.path(), networks.len());
                self.networks = Some(networks);
            }
            RegisterEvent::Registered => {}
        }
        Ok(())
    }

    fn rollback(&mut self, modem: &mut Modem) {
        if let Err(e) = modem.set_registration_state(RegistrationState::Idle) {
            debug!("{}: register rollback: {}", modem.path(), e);
        }
        if modem.state() != ModemState::Enabled {
            modem.change_state(ModemState::Enabled, StateChangeReason::Unknown);
        }
    }

    fn cancel_policy(&self) -> CancelPolicy {
        CancelPolicy {
            interruptible: &[ModemState::Searching],
            restore: Restore::PreOperation,
        }
    }

    fn finish(&mut self, _modem: &mut Modem) -> Result<(), ModemError> {
        Ok(())
    }
}

//! Control methods
//!
//! Slow methods take a [`Completion`] and may hand it back in a [`Rejected`]
//! when they refuse the request outright. Fault-injectable ones go through
//! [`Modem::intercept`] first. The rest are synchronous and return their
//! result directly.

use mm_protocol::{
    interface, Band, CoreError, ModemError, ModemState, Modes, PowerState, PropertyMap,
    PropertyValue, StateChangeReason, ROOT_PATH,
};
use tracing::{debug, info, warn};

use crate::bearer::Bearer;
use crate::completion::{Completion, Rejected};
use crate::fault::Method;
use crate::lease::{self, OperationKind};
use crate::machine::{self, ConnectMachine, DisableMachine, DisconnectMachine, EnableMachine};
use crate::network::Network;
use crate::Modem;

/// What `Command` answers with, whatever the command
pub const COMMAND_RESPONSE: &str = "Bananas are tasty and fresh.";

impl Modem {
    // ------------------------------------------------------------------
    // Engine-backed operations
    // ------------------------------------------------------------------

    /// Modem.Enable
    pub fn enable(&mut self, enable: bool, done: Completion<()>) -> Result<(), Rejected<()>> {
        let args = vec![enable.to_string()];
        self.intercept(Method::Enable, args, done, move |modem, done| {
            let started = if enable {
                machine::start(modem, EnableMachine::new(), done)
            } else {
                machine::start(modem, DisableMachine::new(), done)
            };
            started.map(|_| ())
        })
    }

    /// Simple.Connect, resolving with the connected bearer's path
    pub fn connect(
        &mut self,
        properties: PropertyMap,
        done: Completion<String>,
    ) -> Result<(), Rejected<String>> {
        let args = properties
            .iter()
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect();
        self.intercept(Method::Connect, args, done, move |modem, done| {
            machine::start(modem, ConnectMachine::new(&properties), done).map(|_| ())
        })
    }

    /// Simple.Disconnect; `"/"` disconnects every bearer
    pub fn disconnect(&mut self, bearer: &str, done: Completion<()>) -> Result<(), Rejected<()>> {
        let bearer = bearer.to_string();
        self.intercept(Method::Disconnect, vec![bearer.clone()], done, move |modem, done| {
            machine::start(modem, DisconnectMachine::new(bearer), done).map(|_| ())
        })
    }

    // ------------------------------------------------------------------
    // Technology hooks
    // ------------------------------------------------------------------

    /// Automatic registration
    pub fn register_with_network(&mut self, done: Completion<()>) -> Result<(), Rejected<()>> {
        self.intercept(Method::RegisterWithNetwork, Vec::new(), done, |modem, done| {
            modem.technology().register_with_network(modem, done)
        })
    }

    pub fn unregister_with_network(&mut self) -> Result<(), ModemError> {
        self.technology().unregister_with_network(self)
    }

    /// Scan for visible networks
    pub fn scan(&mut self, done: Completion<Vec<Network>>) {
        let result = self.intercept(Method::Scan, Vec::new(), done, |modem, done| {
            modem.technology().scan(modem, done);
            Ok(())
        });
        if let Err(rejected) = result {
            rejected.forward(self);
        }
    }

    /// Register with a specific operator
    pub fn register(&mut self, operator_code: &str, operator_name: &str, done: Completion<()>) {
        let args = vec![operator_code.to_string(), operator_name.to_string()];
        let result = self.intercept(Method::Register, args, done, |modem, done| {
            modem
                .technology()
                .register(modem, operator_code, operator_name, done);
            Ok(())
        });
        if let Err(rejected) = result {
            rejected.forward(self);
        }
    }

    /// Simple.GetStatus
    pub fn status(&self) -> PropertyMap {
        self.technology().status(self)
    }

    // ------------------------------------------------------------------
    // Bearers
    // ------------------------------------------------------------------

    pub fn list_bearers(&self) -> Vec<String> {
        self.bearers.keys().cloned().collect()
    }

    pub fn bearer(&self, path: &str) -> Option<&Bearer> {
        self.bearers.get(path)
    }

    /// Path of a bearer created with exactly `properties`
    pub fn find_bearer(&self, properties: &PropertyMap) -> Option<String> {
        self.bearers
            .values()
            .find(|bearer| bearer.properties() == properties)
            .map(|bearer| bearer.path().to_string())
    }

    pub fn create_bearer(&mut self, properties: PropertyMap) -> Result<String, ModemError> {
        let max = self.max_bearers();
        if self.bearers.len() >= max {
            return Err(ModemError::core(
                CoreError::TooMany,
                format!("Cannot create more than {max} bearer(s)"),
            ));
        }
        let bearer = Bearer::new(properties)?;
        let path = bearer.path().to_string();
        info!("{}: created bearer {}", self.path(), path);
        self.bearers.insert(path.clone(), bearer);
        Ok(path)
    }

    pub fn delete_bearer(&mut self, path: &str) -> Result<(), ModemError> {
        let Some(bearer) = self.bearers.remove(path) else {
            return Err(not_found(path));
        };
        info!("{}: deleted bearer {}", self.path(), path);
        if bearer.is_connected()
            && !self.has_active_bearers()
            && self.state() == ModemState::Connected
        {
            self.change_state(ModemState::Registered, StateChangeReason::UserRequested);
        }
        Ok(())
    }

    pub(crate) fn activate_bearer(&mut self, path: &str) -> Result<(), ModemError> {
        let max = self.max_active_bearers();
        let active = self.active_bearers().len();
        let bearer = self.bearers.get_mut(path).ok_or_else(|| not_found(path))?;
        if bearer.is_connected() {
            return Err(ModemError::core(
                CoreError::Connected,
                format!("Bearer {path} is already active"),
            ));
        }
        if active >= max {
            return Err(ModemError::core(
                CoreError::TooMany,
                format!("Cannot have more than {max} active bearer(s)"),
            ));
        }
        bearer.set_connected(true);
        debug!("{}: activated bearer {}", self.path(), path);
        Ok(())
    }

    pub(crate) fn deactivate_bearer(&mut self, path: &str) -> Result<(), ModemError> {
        let bearer = self.bearers.get_mut(path).ok_or_else(|| not_found(path))?;
        if !bearer.is_connected() {
            return Err(ModemError::core(
                CoreError::WrongState,
                format!("Bearer {path} is not active"),
            ));
        }
        bearer.set_connected(false);
        debug!("{}: deactivated bearer {}", self.path(), path);
        Ok(())
    }

    pub fn has_active_bearers(&self) -> bool {
        self.bearers.values().any(Bearer::is_connected)
    }

    pub fn active_bearers(&self) -> Vec<String> {
        self.bearers
            .values()
            .filter(|bearer| bearer.is_connected())
            .map(|bearer| bearer.path().to_string())
            .collect()
    }

    fn max_bearers(&self) -> usize {
        self.property_u32(interface::MODEM, "MaxBearers").unwrap_or(0) as usize
    }

    fn max_active_bearers(&self) -> usize {
        self.property_u32(interface::MODEM, "MaxActiveBearers")
            .unwrap_or(0) as usize
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Modem.Reset
    ///
    /// Tears the modem down (disconnect, drop bearers, disable), rebuilds its
    /// properties and enables it again once the reset delay has passed. Only
    /// refused while an enable or disable is in flight.
    pub fn reset(&mut self) -> Result<(), ModemError> {
        for kind in [OperationKind::Enable, OperationKind::Disable] {
            if let Some(lease) = self.leases().holder(kind) {
                return Err(lease::in_progress(kind, lease.id()));
            }
        }
        info!("{}: resetting", self.path());
        if self.state() == ModemState::Connected {
            let done = Completion::callback(|modem: &mut Modem, result: Result<(), ModemError>| {
                if let Err(e) = result {
                    warn!("{}: reset: disconnect failed: {}", modem.path(), e);
                }
                modem.reset_teardown();
            });
            self.internal(|modem| {
                if let Err(rejected) = modem.disconnect(ROOT_PATH, done) {
                    rejected.forward(modem);
                }
            });
        } else {
            self.reset_teardown();
        }
        Ok(())
    }

    fn reset_teardown(&mut self) {
        self.bearers.clear();
        if self.state() == ModemState::Disabled {
            return self.reset_restart();
        }
        let done = Completion::callback(|modem: &mut Modem, result: Result<(), ModemError>| {
            if let Err(e) = result {
                warn!("{}: reset: disable failed: {}", modem.path(), e);
            }
            modem.reset_restart();
        });
        self.internal(|modem| {
            if let Err(rejected) = modem.enable(false, done) {
                rejected.forward(modem);
            }
        });
    }

    fn reset_restart(&mut self) {
        if self.state() != ModemState::Disabled {
            self.change_state(ModemState::Disabled, StateChangeReason::Unknown);
        }
        self.reinitialize_properties();
        let delay = self.timing().reset();
        self.schedule_after(delay, |modem| {
            let started =
                modem.internal(|modem| modem.enable(true, Completion::detached("reset enable")));
            if let Err(rejected) = started {
                warn!("{}: reset: enable refused: {}", modem.path(), rejected.error);
            }
        });
    }

    // ------------------------------------------------------------------
    // Configuration methods
    // ------------------------------------------------------------------

    /// Modem.FactoryReset; accepted and ignored
    pub fn factory_reset(&mut self, code: &str) -> Result<(), ModemError> {
        debug!("{}: factory reset with code {:?} ignored", self.path(), code);
        Ok(())
    }

    pub fn set_allowed_modes(&mut self, modes: Modes, preferred: Modes) -> Result<(), ModemError> {
        if !modes.contains(preferred) {
            return Err(ModemError::core(
                CoreError::InvalidArgs,
                format!("Preferred mode {preferred} is not within allowed modes {modes}"),
            ));
        }
        self.write_property(interface::MODEM, "AllowedModes", PropertyValue::U32(modes.bits()))?;
        self.write_property(
            interface::MODEM,
            "PreferredMode",
            PropertyValue::U32(preferred.bits()),
        )
    }

    pub fn set_bands(&mut self, bands: &[Band]) -> Result<(), ModemError> {
        let supported = self
            .properties()
            .get(interface::MODEM, "SupportedBands")?
            .as_u32_list()
            .map(<[u32]>::to_vec)
            .unwrap_or_default();
        if let Some(band) = bands
            .iter()
            .find(|band| **band != Band::ANY && !supported.contains(&band.as_u32()))
        {
            return Err(ModemError::core(
                CoreError::InvalidArgs,
                format!("Band {} is not supported", band.as_u32()),
            ));
        }
        let value = PropertyValue::U32List(bands.iter().map(|band| band.as_u32()).collect());
        self.write_property(interface::MODEM, "Bands", value)
    }

    /// Modem.Command; every command gets the same canned answer
    pub fn command(&mut self, cmd: &str, timeout: u32) -> Result<String, ModemError> {
        debug!("{}: command {:?} (timeout {}s)", self.path(), cmd, timeout);
        Ok(COMMAND_RESPONSE.to_string())
    }

    pub fn set_power_state(&mut self, power_state: PowerState) -> Result<(), ModemError> {
        info!("{}: power state -> {:?}", self.path(), power_state);
        self.write_property(
            interface::MODEM,
            "PowerState",
            PropertyValue::U32(power_state.as_u32()),
        )
    }
}

fn not_found(path: &str) -> ModemError {
    ModemError::core(CoreError::NotFound, format!("No bearer with path {path}"))
}

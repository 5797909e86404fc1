//! Technology capability interface
//!
//! Methods whose meaning depends on the radio family (scanning, registering,
//! status reporting) are hooks on [`Technology`]. The default hook fails
//! with `Unsupported`; a technology fills in the ones it implements. A modem
//! holds exactly one technology for its whole life.

use std::fmt;

use mm_protocol::{interface, CoreError, InterfaceMap, ModemError, PropertyMap, PropertyValue};

use crate::completion::{Completion, Rejected};
use crate::network::Network;
use crate::Modem;

pub(crate) fn unsupported(technology: &str, method: &str) -> ModemError {
    ModemError::core(
        CoreError::Unsupported,
        format!("{method} is not supported by {technology} modems"),
    )
}

/// Radio-family specific behavior of a modem
pub trait Technology: fmt::Debug + Send + Sync {
    /// Short family name used in logs and errors
    fn name(&self) -> &'static str;

    /// Add or adjust properties on top of the common modem set
    fn initialize_properties(&self, _interfaces: &mut InterfaceMap) {}

    /// Simple.GetStatus
    fn status(&self, modem: &Modem) -> PropertyMap {
        PropertyMap::from([(
            "state".to_string(),
            PropertyValue::I32(modem.state().as_i32()),
        )])
    }

    /// Start automatic network registration
    fn register_with_network(
        &self,
        _modem: &mut Modem,
        done: Completion<()>,
    ) -> Result<(), Rejected<()>> {
        Err(Rejected::new(
            unsupported(self.name(), "RegisterWithNetwork"),
            done,
        ))
    }

    /// Drop the current network registration
    fn unregister_with_network(&self, _modem: &mut Modem) -> Result<(), ModemError> {
        Err(unsupported(self.name(), "UnregisterWithNetwork"))
    }

    /// List visible networks
    fn scan(&self, modem: &mut Modem, done: Completion<Vec<Network>>) {
        done.fail(modem, unsupported(self.name(), "Scan"));
    }

    /// Register with a specific operator
    fn register(
        &self,
        modem: &mut Modem,
        _operator_code: &str,
        _operator_name: &str,
        done: Completion<()>,
    ) {
        done.fail(modem, unsupported(self.name(), "Register"));
    }
}

/// A modem with no radio-family capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericModem;

impl Technology for GenericModem {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn initialize_properties(&self, interfaces: &mut InterfaceMap) {
        if let Some(modem) = interfaces.get_mut(interface::MODEM) {
            modem.insert("MaxBearers".into(), PropertyValue::U32(1));
            modem.insert("MaxActiveBearers".into(), PropertyValue::U32(1));
        }
    }
}

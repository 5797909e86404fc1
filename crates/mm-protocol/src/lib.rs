//! ModemManager1 Protocol Vocabulary
//!
//! This crate holds the control-plane surface a simulated modem shares with
//! the connection manager that drives it:
//!
//! - **States**: `ModemState`, 3GPP `RegistrationState`, `StateChangeReason`,
//!   `PowerState`, `ModemLock` and `NetworkAvailability` with their wire values
//! - **Bitmasks**: `Capabilities`, `AccessTechnologies`, `Modes` and `Band`
//! - **Properties**: `PropertyValue` plus interface and object path names
//! - **Errors**: `ModemError`, the closed structured error taxonomy
//!
//! Nothing here has behavior beyond conversions and validation; the runtime
//! lives in the `pseudomodem` crate.
//!
//! # Example
//!
//! ```rust
//! use mm_protocol::{CoreError, ModemError, ModemState};
//!
//! let err = ModemError::core(CoreError::InProgress, "Registration in progress");
//! assert_eq!(err.code(), 7);
//! assert_eq!(err.dbus_name(), "org.freedesktop.ModemManager1.Core.InProgress");
//!
//! assert_eq!(ModemState::from_i32(8), Some(ModemState::Registered));
//! ```

pub mod error;
pub mod flags;
pub mod state;
pub mod value;

pub use error::{
    ConnectionError, CoreError, ErrorKind, MobileEquipmentError, ModemError, PropertyError,
};
pub use flags::{AccessTechnologies, Band, Capabilities, Modes};
pub use state::{
    ModemLock, ModemState, NetworkAvailability, PowerState, RegistrationState, StateChangeReason,
};
pub use value::{InterfaceMap, PropertyMap, PropertyValue};

/// Well-known bus name and root object path of the modem manager service
pub const MM1: &str = "org.freedesktop.ModemManager1";

/// Root object path under which modems, bearers and SIMs live
pub const MM1_PATH: &str = "/org/freedesktop/ModemManager1";

/// The empty object path, used for "no object" and "all bearers"
pub const ROOT_PATH: &str = "/";

/// Interface names exposed by a modem object
pub mod interface {
    pub const MODEM: &str = "org.freedesktop.ModemManager1.Modem";
    pub const MODEM_SIMPLE: &str = "org.freedesktop.ModemManager1.Modem.Simple";
    pub const MODEM_3GPP: &str = "org.freedesktop.ModemManager1.Modem.Modem3gpp";
    pub const BEARER: &str = "org.freedesktop.ModemManager1.Bearer";
    pub const SIM: &str = "org.freedesktop.ModemManager1.Sim";
}

/// Object path for the modem with the given index
pub fn modem_path(index: u32) -> String {
    format!("{MM1_PATH}/Modem/{index}")
}

/// Object path for the bearer with the given index
pub fn bearer_path(index: u32) -> String {
    format!("{MM1_PATH}/Bearer/{index}")
}

/// Object path for the SIM with the given index
pub fn sim_path(index: u32) -> String {
    format!("{MM1_PATH}/SIM/{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_paths() {
        assert_eq!(modem_path(0), "/org/freedesktop/ModemManager1/Modem/0");
        assert_eq!(bearer_path(3), "/org/freedesktop/ModemManager1/Bearer/3");
        assert_eq!(sim_path(1), "/org/freedesktop/ModemManager1/SIM/1");
    }

    #[test]
    fn test_interfaces_are_under_service_name() {
        for iface in [
            interface::MODEM,
            interface::MODEM_SIMPLE,
            interface::MODEM_3GPP,
            interface::BEARER,
            interface::SIM,
        ] {
            assert!(iface.starts_with(MM1));
        }
    }
}

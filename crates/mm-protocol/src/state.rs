//! Enumerated modem states and their wire values

use std::fmt;

/// Operational state of a modem
///
/// Variants are declared in ascending wire-value order, so the derived
/// ordering matches the numeric ordering used by the protocol ("at least
/// enabled" is `state >= ModemState::Enabled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModemState {
    Failed,
    Unknown,
    Initializing,
    Locked,
    Disabled,
    Disabling,
    Enabling,
    Enabled,
    Searching,
    Registered,
    Disconnecting,
    Connecting,
    Connected,
}

impl ModemState {
    /// All states in wire-value order
    pub const ALL: [ModemState; 13] = [
        ModemState::Failed,
        ModemState::Unknown,
        ModemState::Initializing,
        ModemState::Locked,
        ModemState::Disabled,
        ModemState::Disabling,
        ModemState::Enabling,
        ModemState::Enabled,
        ModemState::Searching,
        ModemState::Registered,
        ModemState::Disconnecting,
        ModemState::Connecting,
        ModemState::Connected,
    ];

    /// Wire value of this state
    pub fn as_i32(self) -> i32 {
        match self {
            ModemState::Failed => -1,
            ModemState::Unknown => 0,
            ModemState::Initializing => 1,
            ModemState::Locked => 2,
            ModemState::Disabled => 3,
            ModemState::Disabling => 4,
            ModemState::Enabling => 5,
            ModemState::Enabled => 6,
            ModemState::Searching => 7,
            ModemState::Registered => 8,
            ModemState::Disconnecting => 9,
            ModemState::Connecting => 10,
            ModemState::Connected => 11,
        }
    }

    /// Parse a wire value
    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_i32() == value)
    }

    /// Upper-case protocol name
    pub fn name(&self) -> &'static str {
        match self {
            ModemState::Failed => "FAILED",
            ModemState::Unknown => "UNKNOWN",
            ModemState::Initializing => "INITIALIZING",
            ModemState::Locked => "LOCKED",
            ModemState::Disabled => "DISABLED",
            ModemState::Disabling => "DISABLING",
            ModemState::Enabling => "ENABLING",
            ModemState::Enabled => "ENABLED",
            ModemState::Searching => "SEARCHING",
            ModemState::Registered => "REGISTERED",
            ModemState::Disconnecting => "DISCONNECTING",
            ModemState::Connecting => "CONNECTING",
            ModemState::Connected => "CONNECTED",
        }
    }

    /// True for states that a modem only passes through on its way somewhere
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ModemState::Initializing
                | ModemState::Disabling
                | ModemState::Enabling
                | ModemState::Searching
                | ModemState::Disconnecting
                | ModemState::Connecting
        )
    }
}

impl fmt::Display for ModemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 3GPP network registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RegistrationState {
    Idle,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

impl RegistrationState {
    pub fn as_u32(self) -> u32 {
        match self {
            RegistrationState::Idle => 0,
            RegistrationState::Home => 1,
            RegistrationState::Searching => 2,
            RegistrationState::Denied => 3,
            RegistrationState::Unknown => 4,
            RegistrationState::Roaming => 5,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(RegistrationState::Idle),
            1 => Some(RegistrationState::Home),
            2 => Some(RegistrationState::Searching),
            3 => Some(RegistrationState::Denied),
            4 => Some(RegistrationState::Unknown),
            5 => Some(RegistrationState::Roaming),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistrationState::Idle => "IDLE",
            RegistrationState::Home => "HOME",
            RegistrationState::Searching => "SEARCHING",
            RegistrationState::Denied => "DENIED",
            RegistrationState::Unknown => "UNKNOWN",
            RegistrationState::Roaming => "ROAMING",
        }
    }

    /// Home and roaming both count as registered
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationState::Home | RegistrationState::Roaming)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reason attached to a `StateChanged` signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StateChangeReason {
    Unknown,
    UserRequested,
    Suspend,
}

impl StateChangeReason {
    pub fn as_u32(self) -> u32 {
        match self {
            StateChangeReason::Unknown => 0,
            StateChangeReason::UserRequested => 1,
            StateChangeReason::Suspend => 2,
        }
    }
}

/// Radio power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PowerState {
    Unknown,
    Off,
    Low,
    On,
}

impl PowerState {
    pub fn as_u32(self) -> u32 {
        match self {
            PowerState::Unknown => 0,
            PowerState::Off => 1,
            PowerState::Low => 2,
            PowerState::On => 3,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(PowerState::Unknown),
            1 => Some(PowerState::Off),
            2 => Some(PowerState::Low),
            3 => Some(PowerState::On),
            _ => None,
        }
    }
}

/// Lock that must be cleared before the modem can be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModemLock {
    Unknown,
    None,
    SimPin,
    SimPin2,
    SimPuk,
    SimPuk2,
    PhSpPin,
    PhSpPuk,
    PhNetPin,
    PhNetPuk,
    PhSimPin,
    PhCorpPin,
    PhCorpPuk,
    PhFsimPin,
    PhFsimPuk,
    PhNetsubPin,
    PhNetsubPuk,
}

impl ModemLock {
    /// Wire value; locks are numbered in declaration order
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Availability of a network found by a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NetworkAvailability {
    Unknown,
    #[default]
    Available,
    Current,
    Forbidden,
}

impl NetworkAvailability {
    pub fn as_u32(self) -> u32 {
        match self {
            NetworkAvailability::Unknown => 0,
            NetworkAvailability::Available => 1,
            NetworkAvailability::Current => 2,
            NetworkAvailability::Forbidden => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_state_wire_values() {
        assert_eq!(ModemState::Failed.as_i32(), -1);
        assert_eq!(ModemState::Disabled.as_i32(), 3);
        assert_eq!(ModemState::Connected.as_i32(), 11);
        for state in ModemState::ALL {
            assert_eq!(ModemState::from_i32(state.as_i32()), Some(state));
        }
        assert_eq!(ModemState::from_i32(12), None);
    }

    #[test]
    fn test_modem_state_ordering_follows_wire_values() {
        for pair in ModemState::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].as_i32() < pair[1].as_i32());
        }
        assert!(ModemState::Registered >= ModemState::Enabled);
        assert!(ModemState::Enabling < ModemState::Enabled);
    }

    #[test]
    fn test_registration_state() {
        assert_eq!(RegistrationState::from_u32(5), Some(RegistrationState::Roaming));
        assert_eq!(RegistrationState::from_u32(6), None);
        assert!(RegistrationState::Home.is_registered());
        assert!(!RegistrationState::Searching.is_registered());
        assert_eq!(RegistrationState::Denied.to_string(), "DENIED");
    }

    #[test]
    fn test_lock_values() {
        assert_eq!(ModemLock::Unknown.as_u32(), 0);
        assert_eq!(ModemLock::None.as_u32(), 1);
        assert_eq!(ModemLock::SimPin.as_u32(), 2);
        assert_eq!(ModemLock::SimPuk.as_u32(), 4);
        assert_eq!(ModemLock::PhNetsubPuk.as_u32(), 16);
    }

    #[test]
    fn test_transitional_states() {
        assert!(ModemState::Searching.is_transitional());
        assert!(ModemState::Connecting.is_transitional());
        assert!(!ModemState::Enabled.is_transitional());
        assert!(!ModemState::Connected.is_transitional());
    }
}

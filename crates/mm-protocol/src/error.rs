//! Structured error taxonomy
//!
//! Every failure a modem reports is a [`ModemError`]: an immutable record of
//! an error kind, its stable numeric code and a human-readable message. Kinds
//! are grouped into families that map onto bus error names:
//!
//! | Family | Bus name prefix |
//! |---|---|
//! | [`CoreError`] | `org.freedesktop.ModemManager1.Core` |
//! | [`MobileEquipmentError`] | `org.freedesktop.ModemManager1.MobileEquipment` |
//! | [`ConnectionError`] | `org.freedesktop.ModemManager1.Connection` |
//! | [`PropertyError`] | `org.freedesktop.ModemManager1` |

use std::fmt;

use thiserror::Error;

use crate::MM1;

macro_rules! error_family {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $code:literal => $label:literal),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Stable numeric code
            pub fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code,)*
                }
            }

            /// Last component of the bus error name
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                }
            }

            /// Look a kind up by its numeric code
            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

error_family!(
    /// Operation-control failures
    CoreError {
        Failed = 0 => "Failed",
        Cancelled = 1 => "Cancelled",
        Aborted = 2 => "Aborted",
        Unsupported = 3 => "Unsupported",
        NoPlugins = 4 => "NoPlugins",
        Unauthorized = 5 => "Unauthorized",
        InvalidArgs = 6 => "InvalidArgs",
        InProgress = 7 => "InProgress",
        WrongState = 8 => "WrongState",
        Connected = 9 => "Connected",
        TooMany = 10 => "TooMany",
        NotFound = 11 => "NotFound",
        Retry = 12 => "Retry",
        Exists = 13 => "Exists",
    }
);

error_family!(
    /// Device-domain failures reported by the mobile equipment (3GPP TS 27.007)
    MobileEquipmentError {
        PhoneFailure = 0 => "PhoneFailure",
        NoConnection = 1 => "NoConnection",
        LinkReserved = 2 => "LinkReserved",
        NotAllowed = 3 => "NotAllowed",
        NotSupported = 4 => "NotSupported",
        PhSimPin = 5 => "PhSimPin",
        PhFsimPin = 6 => "PhFsimPin",
        PhFsimPuk = 7 => "PhFsimPuk",
        SimNotInserted = 10 => "SimNotInserted",
        SimPin = 11 => "SimPin",
        SimPuk = 12 => "SimPuk",
        SimFailure = 13 => "SimFailure",
        SimBusy = 14 => "SimBusy",
        SimWrong = 15 => "SimWrong",
        IncorrectPassword = 16 => "IncorrectPassword",
        SimPin2 = 17 => "SimPin2",
        SimPuk2 = 18 => "SimPuk2",
        MemoryFull = 20 => "MemoryFull",
        InvalidIndex = 21 => "InvalidIndex",
        NotFound = 22 => "NotFound",
        MemoryFailure = 23 => "MemoryFailure",
        TextTooLong = 24 => "TextTooLong",
        InvalidChars = 25 => "InvalidChars",
        DialStringTooLong = 26 => "DialStringTooLong",
        InvalidDialString = 27 => "InvalidDialString",
        NoNetwork = 30 => "NoNetwork",
        NetworkTimeout = 31 => "NetworkTimeout",
        NetworkNotAllowed = 32 => "NetworkNotAllowed",
        NetworkPin = 40 => "NetworkPin",
        NetworkPuk = 41 => "NetworkPuk",
        NetworkSubsetPin = 42 => "NetworkSubsetPin",
        NetworkSubsetPuk = 43 => "NetworkSubsetPuk",
        ServicePin = 44 => "ServicePin",
        ServicePuk = 45 => "ServicePuk",
        CorpPin = 46 => "CorpPin",
        CorpPuk = 47 => "CorpPuk",
        Unknown = 100 => "Unknown",
        GprsIllegalMs = 103 => "GprsIllegalMs",
        GprsIllegalMe = 106 => "GprsIllegalMe",
        GprsServiceNotAllowed = 107 => "GprsServiceNotAllowed",
        GprsPlmnNotAllowed = 111 => "GprsPlmnNotAllowed",
        GprsLocationNotAllowed = 112 => "GprsLocationNotAllowed",
        GprsRoamingNotAllowed = 113 => "GprsRoamingNotAllowed",
        GprsServiceOptionNotSupported = 132 => "GprsServiceOptionNotSupported",
        GprsServiceOptionNotSubscribed = 133 => "GprsServiceOptionNotSubscribed",
        GprsServiceOptionOutOfOrder = 134 => "GprsServiceOptionOutOfOrder",
        GprsUnknown = 148 => "GprsUnknown",
        GprsPdpAuthFailure = 149 => "GprsPdpAuthFailure",
        GprsInvalidMobileClass = 150 => "GprsInvalidMobileClass",
    }
);

error_family!(
    /// Call setup failures
    ConnectionError {
        Unknown = 0 => "Unknown",
        NoCarrier = 1 => "NoCarrier",
        NoDialtone = 2 => "NoDialtone",
        Busy = 3 => "Busy",
        NoAnswer = 4 => "NoAnswer",
    }
);

error_family!(
    /// Property access failures
    PropertyError {
        UnknownProperty = 0 => "UnknownProperty",
        UnknownInterface = 1 => "UnknownInterface",
    }
);

/// An error kind from any family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    Core(CoreError),
    MobileEquipment(MobileEquipmentError),
    Connection(ConnectionError),
    Property(PropertyError),
}

impl ErrorKind {
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::Core(k) => k.code(),
            ErrorKind::MobileEquipment(k) => k.code(),
            ErrorKind::Connection(k) => k.code(),
            ErrorKind::Property(k) => k.code(),
        }
    }

    /// Bus error name prefix for this kind's family
    pub fn family_prefix(self) -> String {
        match self {
            ErrorKind::Core(_) => format!("{MM1}.Core"),
            ErrorKind::MobileEquipment(_) => format!("{MM1}.MobileEquipment"),
            ErrorKind::Connection(_) => format!("{MM1}.Connection"),
            ErrorKind::Property(_) => MM1.to_string(),
        }
    }

    /// Fully qualified bus error name
    pub fn dbus_name(self) -> String {
        let label = match self {
            ErrorKind::Core(k) => k.label(),
            ErrorKind::MobileEquipment(k) => k.label(),
            ErrorKind::Connection(k) => k.label(),
            ErrorKind::Property(k) => k.label(),
        };
        format!("{}.{}", self.family_prefix(), label)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dbus_name())
    }
}

impl From<CoreError> for ErrorKind {
    fn from(kind: CoreError) -> Self {
        ErrorKind::Core(kind)
    }
}

impl From<MobileEquipmentError> for ErrorKind {
    fn from(kind: MobileEquipmentError) -> Self {
        ErrorKind::MobileEquipment(kind)
    }
}

impl From<ConnectionError> for ErrorKind {
    fn from(kind: ConnectionError) -> Self {
        ErrorKind::Connection(kind)
    }
}

impl From<PropertyError> for ErrorKind {
    fn from(kind: PropertyError) -> Self {
        ErrorKind::Property(kind)
    }
}

/// Structured error reported by a modem
///
/// Fields are private; a `ModemError` never changes after it is created and
/// travels unchanged from the point of failure to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{kind}: {message}")]
pub struct ModemError {
    kind: ErrorKind,
    message: String,
}

impl ModemError {
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn core(kind: CoreError, message: impl Into<String>) -> Self {
        Self::new(kind, message)
    }

    pub fn mobile_equipment(kind: MobileEquipmentError, message: impl Into<String>) -> Self {
        Self::new(kind, message)
    }

    pub fn connection(kind: ConnectionError, message: impl Into<String>) -> Self {
        Self::new(kind, message)
    }

    pub fn property(kind: PropertyError, message: impl Into<String>) -> Self {
        Self::new(kind, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn dbus_name(&self) -> String {
        self.kind.dbus_name()
    }

    /// True if this error is of the given kind
    pub fn is(&self, kind: impl Into<ErrorKind>) -> bool {
        self.kind == kind.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_codes() {
        assert_eq!(CoreError::Failed.code(), 0);
        assert_eq!(CoreError::Unsupported.code(), 3);
        assert_eq!(CoreError::InProgress.code(), 7);
        assert_eq!(CoreError::WrongState.code(), 8);
        assert_eq!(CoreError::Exists.code(), 13);
        assert_eq!(CoreError::from_code(11), Some(CoreError::NotFound));
        assert_eq!(CoreError::from_code(14), None);
    }

    #[test]
    fn test_mobile_equipment_codes() {
        assert_eq!(MobileEquipmentError::NoNetwork.code(), 30);
        assert_eq!(MobileEquipmentError::SimNotInserted.code(), 10);
        assert_eq!(MobileEquipmentError::GprsInvalidMobileClass.code(), 150);
        assert_eq!(
            MobileEquipmentError::from_code(31),
            Some(MobileEquipmentError::NetworkTimeout)
        );
        assert_eq!(MobileEquipmentError::from_code(8), None);
    }

    #[test]
    fn test_dbus_names() {
        let err = ModemError::mobile_equipment(MobileEquipmentError::NoNetwork, "none");
        assert_eq!(
            err.dbus_name(),
            "org.freedesktop.ModemManager1.MobileEquipment.NoNetwork"
        );
        let err = ModemError::property(PropertyError::UnknownInterface, "x");
        assert_eq!(err.dbus_name(), "org.freedesktop.ModemManager1.UnknownInterface");
        let err = ModemError::connection(ConnectionError::NoCarrier, "x");
        assert_eq!(err.dbus_name(), "org.freedesktop.ModemManager1.Connection.NoCarrier");
    }

    #[test]
    fn test_display_includes_name_and_message() {
        let err = ModemError::core(CoreError::WrongState, "Modem not enabled");
        assert_eq!(
            err.to_string(),
            "org.freedesktop.ModemManager1.Core.WrongState: Modem not enabled"
        );
    }

    #[test]
    fn test_is_matches_kind_across_families() {
        let err = ModemError::core(CoreError::NotFound, "gone");
        assert!(err.is(CoreError::NotFound));
        assert!(!err.is(MobileEquipmentError::NotFound));
        assert_eq!(err.code(), 11);
        assert_eq!(err.message(), "gone");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let err = ModemError::core(CoreError::Failed, "injected");
        let json = serde_json::to_string(&err).unwrap();
        let back: ModemError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}

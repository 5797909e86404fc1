//! Bitmask and band values

use std::fmt;
use std::ops::{BitAnd, BitOr};

macro_rules! bitmask {
    ($(#[$meta:meta])* $name:ident { $($flag:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const fn from_bits(bits: u32) -> Self {
                $name(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            /// True if every bit of `other` is set in `self`
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitAnd for $name {
            type Output = $name;

            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
}

bitmask!(
    /// Radio technology families a modem supports
    Capabilities {
        NONE = 0,
        POTS = 1 << 0,
        CDMA_EVDO = 1 << 1,
        GSM_UMTS = 1 << 2,
        LTE = 1 << 3,
        LTE_ADVANCED = 1 << 4,
        IRIDIUM = 1 << 5,
    }
);

bitmask!(
    /// Access technologies in use or supported by a network
    AccessTechnologies {
        UNKNOWN = 0,
        POTS = 1 << 0,
        GSM = 1 << 1,
        GSM_COMPACT = 1 << 2,
        GPRS = 1 << 3,
        EDGE = 1 << 4,
        UMTS = 1 << 5,
        HSDPA = 1 << 6,
        HSUPA = 1 << 7,
        HSPA = 1 << 8,
        HSPA_PLUS = 1 << 9,
        EVDO0 = 1 << 11,
        EVDOA = 1 << 12,
        EVDOB = 1 << 13,
        LTE = 1 << 14,
        ANY = 0xFFFF_FFFF,
    }
);

bitmask!(
    /// Network generations a modem may be allowed to use
    Modes {
        NONE = 0,
        CS = 1 << 0,
        MODE_2G = 1 << 1,
        MODE_3G = 1 << 2,
        MODE_4G = 1 << 3,
        ANY = 0xFFFF_FFFF,
    }
);

/// Radio frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Band(u32);

impl Band {
    pub const UNKNOWN: Band = Band(0);
    pub const EGSM: Band = Band(1);
    pub const DCS: Band = Band(2);
    pub const PCS: Band = Band(3);
    pub const G850: Band = Band(4);
    pub const U2100: Band = Band(5);
    pub const U1800: Band = Band(6);
    pub const U17IV: Band = Band(7);
    pub const U800: Band = Band(8);
    pub const U850: Band = Band(9);
    pub const U900: Band = Band(10);
    pub const U17IX: Band = Band(11);
    pub const U1900: Band = Band(12);
    pub const U2600: Band = Band(13);
    pub const EUTRAN_I: Band = Band(31);
    pub const EUTRAN_II: Band = Band(32);
    pub const EUTRAN_III: Band = Band(33);
    pub const EUTRAN_IV: Band = Band(34);
    pub const EUTRAN_V: Band = Band(35);
    pub const EUTRAN_VII: Band = Band(37);
    pub const EUTRAN_XIII: Band = Band(43);
    pub const EUTRAN_XVII: Band = Band(47);
    pub const ANY: Band = Band(256);

    pub const fn from_u32(value: u32) -> Self {
        Band(value)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "band {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_bits() {
        let caps = Capabilities::GSM_UMTS | Capabilities::LTE;
        assert_eq!(caps.bits(), 12);
        assert!(caps.contains(Capabilities::LTE));
        assert!(!caps.contains(Capabilities::CDMA_EVDO));
        assert!(caps.intersects(Capabilities::GSM_UMTS | Capabilities::POTS));
    }

    #[test]
    fn test_modes_any_contains_everything() {
        let allowed = Modes::MODE_3G | Modes::MODE_4G;
        assert!(Modes::ANY.contains(allowed));
        assert!(allowed.contains(Modes::NONE));
        assert!(!allowed.contains(Modes::MODE_2G));
        assert!(Modes::NONE.is_empty());
    }

    #[test]
    fn test_access_technology_values() {
        assert_eq!(AccessTechnologies::GSM.bits(), 2);
        assert_eq!(AccessTechnologies::UMTS.bits(), 32);
        assert_eq!(AccessTechnologies::LTE.bits(), 16384);
    }

    #[test]
    fn test_band_values() {
        assert_eq!(Band::U850.as_u32(), 9);
        assert_eq!(Band::ANY.as_u32(), 256);
        assert_eq!(Band::from_u32(5), Band::U2100);
    }
}

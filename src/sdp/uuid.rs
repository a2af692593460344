//! Bluetooth UUIDs
//!
//! SDP carries UUIDs in 16-, 32- and 128-bit forms. The short forms are aliases
//! into the Bluetooth Base UUID, so two UUIDs compare equal whenever their
//! 128-bit expansions are equal, whatever width they were received in.

use core::hash::{Hash, Hasher};

/// Bluetooth Base UUID: 00000000-0000-1000-8000-00805F9B34FB
pub const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

const SHORT_MASK: u128 = 0x0000_0000_FFFF_FFFF_FFFF_FFFF_FFFF_FFFF;

/// Protocol identifiers used in protocol descriptor lists
pub mod protocol {
    /// SDP
    pub const SDP: u16 = 0x0001;
    /// UDP
    pub const UDP: u16 = 0x0002;
    /// RFCOMM
    pub const RFCOMM: u16 = 0x0003;
    /// TCP
    pub const TCP: u16 = 0x0004;
    /// OBEX
    pub const OBEX: u16 = 0x0008;
    /// BNEP
    pub const BNEP: u16 = 0x000F;
    /// HID Protocol
    pub const HIDP: u16 = 0x0011;
    /// AVCTP
    pub const AVCTP: u16 = 0x0017;
    /// AVDTP
    pub const AVDTP: u16 = 0x0019;
    /// L2CAP
    pub const L2CAP: u16 = 0x0100;
}

/// A UUID in one of the three SDP wire widths
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uuid {
    /// 16-bit alias into the base UUID
    Uuid16(u16),
    /// 32-bit alias into the base UUID
    Uuid32(u32),
    /// Full 128-bit UUID
    Uuid128(u128),
}

impl Uuid {
    /// Expand to the canonical 128-bit value
    #[must_use]
    pub const fn to_u128(self) -> u128 {
        match self {
            Self::Uuid16(short) => BASE_UUID | ((short as u128) << 96),
            Self::Uuid32(short) => BASE_UUID | ((short as u128) << 96),
            Self::Uuid128(full) => full,
        }
    }

    /// Smallest wire form representing the same UUID
    #[must_use]
    pub const fn shortest(self) -> Self {
        let full = self.to_u128();
        if full & SHORT_MASK != BASE_UUID {
            return Self::Uuid128(full);
        }
        let short = (full >> 96) as u32;
        if short <= 0xFFFF {
            Self::Uuid16(short as u16)
        } else {
            Self::Uuid32(short)
        }
    }

    /// The 16-bit alias, if this UUID has one
    #[must_use]
    pub const fn as_u16(self) -> Option<u16> {
        match self.shortest() {
            Self::Uuid16(short) => Some(short),
            _ => None,
        }
    }

    /// Encoded length of the UUID payload in bytes
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Uuid16(_) => 2,
            Self::Uuid32(_) => 4,
            Self::Uuid128(_) => 16,
        }
    }
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        self.to_u128() == other.to_u128()
    }
}

impl Eq for Uuid {}

impl Hash for Uuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_u128().hash(state);
    }
}

impl From<u16> for Uuid {
    fn from(short: u16) -> Self {
        Self::Uuid16(short)
    }
}

impl From<ServiceClassId> for Uuid {
    fn from(class: ServiceClassId) -> Self {
        class.to_uuid()
    }
}

/// Standard Bluetooth Service Classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ServiceClassId {
    /// SDP Server Service
    ServiceDiscoveryServer = 0x1000,
    /// Browse Group Descriptor
    BrowseGroupDescriptor = 0x1001,
    /// Public Browse Root group
    PublicBrowseRoot = 0x1002,
    /// Serial Port Profile
    SerialPort = 0x1101,
    /// Dialup Networking
    DialupNetworking = 0x1103,
    /// Object Push Profile
    ObjectPush = 0x1105,
    /// Headset Profile
    Headset = 0x1108,
    /// Audio Source
    AudioSource = 0x110A,
    /// Audio Sink
    AudioSink = 0x110B,
    /// A/V Remote Control Target
    AvRemoteControlTarget = 0x110C,
    /// Advanced Audio Distribution Profile
    AdvancedAudioDistribution = 0x110D,
    /// A/V Remote Control
    AvRemoteControl = 0x110E,
    /// A/V Remote Control Controller
    AvRemoteControlController = 0x110F,
    /// Hands-Free Profile
    HandsFree = 0x111E,
    /// Hands-Free Audio Gateway
    HandsFreeAudioGateway = 0x111F,
    /// Human Interface Device
    HumanInterfaceDevice = 0x1124,
    /// PnP Information
    PnpInformation = 0x1200,
}

impl ServiceClassId {
    /// Convert to a UUID
    #[must_use]
    pub const fn to_uuid(self) -> Uuid {
        Uuid::Uuid16(self as u16)
    }

    /// Look up a known service class from any UUID width
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Option<Self> {
        let Some(short) = uuid.as_u16() else {
            return None;
        };
        match short {
            0x1000 => Some(Self::ServiceDiscoveryServer),
            0x1001 => Some(Self::BrowseGroupDescriptor),
            0x1002 => Some(Self::PublicBrowseRoot),
            0x1101 => Some(Self::SerialPort),
            0x1103 => Some(Self::DialupNetworking),
            0x1105 => Some(Self::ObjectPush),
            0x1108 => Some(Self::Headset),
            0x110A => Some(Self::AudioSource),
            0x110B => Some(Self::AudioSink),
            0x110C => Some(Self::AvRemoteControlTarget),
            0x110D => Some(Self::AdvancedAudioDistribution),
            0x110E => Some(Self::AvRemoteControl),
            0x110F => Some(Self::AvRemoteControlController),
            0x111E => Some(Self::HandsFree),
            0x111F => Some(Self::HandsFreeAudioGateway),
            0x1124 => Some(Self::HumanInterfaceDevice),
            0x1200 => Some(Self::PnpInformation),
            _ => None,
        }
    }

    /// Get service name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServiceDiscoveryServer => "Service Discovery Server",
            Self::BrowseGroupDescriptor => "Browse Group Descriptor",
            Self::PublicBrowseRoot => "Public Browse Root",
            Self::SerialPort => "Serial Port",
            Self::DialupNetworking => "Dialup Networking",
            Self::ObjectPush => "Object Push",
            Self::Headset => "Headset",
            Self::AudioSource => "Audio Source",
            Self::AudioSink => "Audio Sink",
            Self::AvRemoteControlTarget => "A/V Remote Control Target",
            Self::AdvancedAudioDistribution => "Advanced Audio Distribution",
            Self::AvRemoteControl => "A/V Remote Control",
            Self::AvRemoteControlController => "A/V Remote Control Controller",
            Self::HandsFree => "Hands-Free",
            Self::HandsFreeAudioGateway => "Hands-Free Audio Gateway",
            Self::HumanInterfaceDevice => "Human Interface Device",
            Self::PnpInformation => "PnP Information",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_forms_equal_expansion() {
        let short = Uuid::Uuid16(0x1101);
        let medium = Uuid::Uuid32(0x0000_1101);
        let full = Uuid::Uuid128(0x0000_1101_0000_1000_8000_0080_5F9B_34FB);

        assert_eq!(short, medium);
        assert_eq!(short, full);
        assert_eq!(medium, full);
        assert_eq!(short.to_u128(), full.to_u128());
    }

    #[test]
    fn test_distinct_uuids_differ() {
        assert_ne!(Uuid::Uuid16(0x1101), Uuid::Uuid16(0x110A));
        assert_ne!(Uuid::Uuid32(0x0001_1101), Uuid::Uuid16(0x1101));
        // Same low bits but outside the base UUID range
        assert_ne!(Uuid::Uuid128(0x0000_1101), Uuid::Uuid16(0x1101));
    }

    #[test]
    fn test_shortest_form() {
        let full = Uuid::Uuid128(0x0000_110A_0000_1000_8000_0080_5F9B_34FB);
        assert!(matches!(full.shortest(), Uuid::Uuid16(0x110A)));

        let wide = Uuid::Uuid128(0x1234_5678_0000_1000_8000_0080_5F9B_34FB);
        assert!(matches!(wide.shortest(), Uuid::Uuid32(0x1234_5678)));

        let custom = Uuid::Uuid128(0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF);
        assert!(matches!(custom.shortest(), Uuid::Uuid128(_)));
        assert_eq!(custom.as_u16(), None);
    }

    #[test]
    fn test_service_class_lookup() {
        let uuid = Uuid::Uuid32(0x0000_110B);
        assert_eq!(ServiceClassId::from_uuid(uuid), Some(ServiceClassId::AudioSink));
        assert_eq!(ServiceClassId::AudioSink.name(), "Audio Sink");
        assert_eq!(Uuid::from(ServiceClassId::SerialPort), Uuid::Uuid16(0x1101));
        assert_eq!(ServiceClassId::from_uuid(Uuid::Uuid16(0x0001)), None);
    }
}

//! Peer device addresses

use crate::sdp::SdpError;
use heapless::String;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Length of `AA:BB:CC:DD:EE:FF`
pub const ADDRESS_STRING_LENGTH: usize = 17;

/// A Bluetooth Device Address (`BD_ADDR`) identifying an SDP peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothAddress(pub [u8; 6]);

impl BluetoothAddress {
    /// The all-zero address, never a valid peer
    pub const ZERO: Self = Self([0; 6]);

    /// Create a new Bluetooth address from bytes
    #[must_use]
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Whether every byte is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        u64::from_le_bytes([
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], 0, 0,
        ]) == 0
    }

    /// Format the address as a colon-separated upper-case hex string
    #[must_use]
    pub fn format_hex(&self) -> String<ADDRESS_STRING_LENGTH> {
        let mut result = String::new();
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            result.push(char::from(HEX_DIGITS[usize::from(byte >> 4)])).ok();
            result.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)])).ok();
        }
        result
    }

    /// Parse a colon-separated hex string such as `00:1A:7D:DA:71:13`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless the string is six colon-separated pairs
    /// of hex digits.
    pub fn from_hex(hex: &str) -> Result<Self, SdpError> {
        if hex.len() != ADDRESS_STRING_LENGTH {
            return Err(SdpError::InvalidParameter);
        }
        let mut bytes = [0u8; 6];
        let mut parts = hex.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or(SdpError::InvalidParameter)?;
            if part.len() != 2 {
                return Err(SdpError::InvalidParameter);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| SdpError::InvalidParameter)?;
        }
        if parts.next().is_some() {
            return Err(SdpError::InvalidParameter);
        }
        Ok(Self(bytes))
    }
}

impl core::fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format_hex())
    }
}

impl From<[u8; 6]> for BluetoothAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for [u8; 6] {
    fn from(addr: BluetoothAddress) -> Self {
        addr.0
    }
}

impl From<BluetoothAddress> for bt_hci::param::BdAddr {
    fn from(addr: BluetoothAddress) -> Self {
        bt_hci::param::BdAddr::new(addr.0)
    }
}

impl TryFrom<bt_hci::param::BdAddr> for BluetoothAddress {
    type Error = SdpError;

    fn try_from(bd_addr: bt_hci::param::BdAddr) -> Result<Self, Self::Error> {
        Self::try_from(&bd_addr.raw()[..])
    }
}

impl TryFrom<&str> for BluetoothAddress {
    type Error = SdpError;

    fn try_from(hex: &str) -> Result<Self, Self::Error> {
        Self::from_hex(hex)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = SdpError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 6]>::try_from(bytes)
            .map(Self)
            .map_err(|_| SdpError::InvalidParameter)
    }
}

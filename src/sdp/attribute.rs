//! SDP Attribute Identifiers and Selectors
//!
//! This module defines the universal attribute IDs, the language-based attribute
//! offsets and the attribute selector carried by attribute requests.

use super::cursor::ByteSink;
use super::element::{CodecError, DataElement, SequenceBuilder};
use super::{AttributeId, SdpError, SdpErrorCode};
use crate::constants::{MAX_ATTRIBUTE_IDS, PRIMARY_LANGUAGE_BASE_ID};
use heapless::Vec;

/// Universal SDP Attribute IDs
///
/// These are standardized attribute IDs defined by the Bluetooth SIG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum UniversalAttributeId {
    /// Service Record Handle
    ServiceRecordHandle = 0x0000,
    /// Service Class ID List
    ServiceClassIdList = 0x0001,
    /// Service Record State
    ServiceRecordState = 0x0002,
    /// Service ID
    ServiceId = 0x0003,
    /// Protocol Descriptor List
    ProtocolDescriptorList = 0x0004,
    /// Browse Group List
    BrowseGroupList = 0x0005,
    /// Language Based Attribute ID List
    LanguageBaseAttributeIdList = 0x0006,
    /// Service Info Time To Live
    ServiceInfoTimeToLive = 0x0007,
    /// Service Availability
    ServiceAvailability = 0x0008,
    /// Bluetooth Profile Descriptor List
    BluetoothProfileDescriptorList = 0x0009,
    /// Documentation URL
    DocumentationUrl = 0x000A,
    /// Client Executable URL
    ClientExecutableUrl = 0x000B,
    /// Icon URL
    IconUrl = 0x000C,
    /// Additional Protocol Descriptor Lists
    AdditionalProtocolDescriptorLists = 0x000D,
}

impl UniversalAttributeId {
    /// Convert to u16 value
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Create from u16 value
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Self::ServiceRecordHandle),
            0x0001 => Some(Self::ServiceClassIdList),
            0x0002 => Some(Self::ServiceRecordState),
            0x0003 => Some(Self::ServiceId),
            0x0004 => Some(Self::ProtocolDescriptorList),
            0x0005 => Some(Self::BrowseGroupList),
            0x0006 => Some(Self::LanguageBaseAttributeIdList),
            0x0007 => Some(Self::ServiceInfoTimeToLive),
            0x0008 => Some(Self::ServiceAvailability),
            0x0009 => Some(Self::BluetoothProfileDescriptorList),
            0x000A => Some(Self::DocumentationUrl),
            0x000B => Some(Self::ClientExecutableUrl),
            0x000C => Some(Self::IconUrl),
            0x000D => Some(Self::AdditionalProtocolDescriptorLists),
            _ => None,
        }
    }
}

/// Language-Based Attribute IDs
///
/// These IDs are offsets added to a language base ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum LanguageAttributeOffset {
    /// Service Name
    ServiceName = 0x0000,
    /// Service Description
    ServiceDescription = 0x0001,
    /// Provider Name
    ProviderName = 0x0002,
}

impl LanguageAttributeOffset {
    /// Attribute ID relative to `base`
    #[must_use]
    pub const fn id(self, base: u16) -> AttributeId {
        base.wrapping_add(self as u16)
    }

    /// Attribute ID relative to the primary language base
    #[must_use]
    pub const fn primary(self) -> AttributeId {
        self.id(PRIMARY_LANGUAGE_BASE_ID)
    }
}

/// Inclusive attribute ID range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeRange {
    /// Start attribute ID (inclusive)
    pub start: u16,
    /// End attribute ID (inclusive)
    pub end: u16,
}

impl AttributeRange {
    /// Create new attribute range
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Check if attribute ID is in range
    #[must_use]
    pub const fn contains(&self, id: u16) -> bool {
        id >= self.start && id <= self.end
    }

    /// Packed form carried in a 32-bit range element
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        ((self.start as u32) << 16) | self.end as u32
    }

    /// Unpack a 32-bit range element
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self {
            start: (value >> 16) as u16,
            end: value as u16,
        }
    }
}

/// Which attributes an attribute request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSelector {
    /// Every attribute whose ID lies in the range
    Range(AttributeRange),
    /// Exactly the listed attribute IDs
    List(Vec<AttributeId, MAX_ATTRIBUTE_IDS>),
}

impl AttributeSelector {
    /// Select every attribute
    #[must_use]
    pub fn all() -> Self {
        Self::Range(AttributeRange::new(0x0000, 0xFFFF))
    }

    /// Select an inclusive range of attribute IDs
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `start > end`.
    pub fn range(start: u16, end: u16) -> Result<Self, SdpError> {
        if start > end {
            return Err(SdpError::InvalidParameter);
        }
        Ok(Self::Range(AttributeRange::new(start, end)))
    }

    /// Select the listed attribute IDs
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an empty list and `TooLarge` for more than
    /// `MAX_ATTRIBUTE_IDS` entries.
    pub fn list(ids: &[AttributeId]) -> Result<Self, SdpError> {
        if ids.is_empty() {
            return Err(SdpError::InvalidParameter);
        }
        Vec::from_slice(ids)
            .map(Self::List)
            .map_err(|()| SdpError::TooLarge)
    }

    /// Whether nothing can match: an empty ID list
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(ids) if ids.is_empty())
    }

    /// Whether the attribute with `id` is selected
    #[must_use]
    pub fn matches(&self, id: AttributeId) -> bool {
        match self {
            Self::Range(range) => range.contains(id),
            Self::List(ids) => ids.contains(&id),
        }
    }

    /// Parse the selector operand of an attribute request
    ///
    /// The operand is a sequence holding either one 32-bit range or a list of
    /// 16-bit attribute IDs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequestSyntax` for any other shape.
    pub fn parse(element: &DataElement<'_>) -> Result<Self, SdpErrorCode> {
        let mut children = element
            .expect_sequence()
            .map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;

        let first = match children.next() {
            Some(Ok(first)) => first,
            _ => return Err(SdpErrorCode::InvalidRequestSyntax),
        };

        if let DataElement::U32(packed) = first {
            let range = AttributeRange::from_u32(packed);
            if children.next().is_some() || range.start > range.end {
                return Err(SdpErrorCode::InvalidRequestSyntax);
            }
            return Ok(Self::Range(range));
        }

        let mut ids = Vec::new();
        for child in core::iter::once(Ok(first)).chain(children) {
            let id = child
                .and_then(|c| c.expect_u16())
                .map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;
            ids.push(id)
                .map_err(|_| SdpErrorCode::InsufficientResources)?;
        }
        Ok(Self::List(ids))
    }

    /// Encode the selector as a request operand
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if `out` cannot hold the encoding.
    pub fn encode<S: ByteSink>(&self, out: &mut S) -> Result<(), CodecError> {
        let mut seq: SequenceBuilder<{ MAX_ATTRIBUTE_IDS * 3 }> = SequenceBuilder::new();
        match self {
            Self::Range(range) => {
                seq.push(&DataElement::U32(range.to_u32()))?;
            }
            Self::List(ids) => {
                for &id in ids {
                    seq.push(&DataElement::U16(id))?;
                }
            }
        }
        seq.finish(out)
    }
}

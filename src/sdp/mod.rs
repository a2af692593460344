//! Service Discovery Protocol (SDP) Implementation
//!
//! This module provides the protocol half of the engine: the Data Element codec,
//! the local service record store, the server request dispatcher, the client
//! request manager and the per-peer connection state machine.

use crate::l2cap::TransportError;

/// Service record handle type
pub type ServiceRecordHandle = u32;

/// Transaction ID for SDP requests/responses
pub type TransactionId = u16;

/// Attribute ID type
pub type AttributeId = u16;

pub mod attribute;
pub mod client;
pub mod connection;
pub mod cursor;
pub mod element;
pub mod fragment;
pub mod protocol;
pub mod record;
pub mod server;
pub mod service;
pub mod uuid;

// Re-export commonly used types
pub use attribute::{AttributeRange, AttributeSelector, LanguageAttributeOffset, UniversalAttributeId};
pub use client::{
    ClientRequest, RequestKind, RequestState, SdpClient, ServiceAttributeCallback,
    ServiceSearchAttributeCallback, ServiceSearchCallback,
};
pub use connection::{ConnectionManager, ConnectionRole, ConnectionState, PeerConnection};
pub use element::{CodecError, DataElement, DataElementSize, DataElementType, SequenceBuilder};
pub use record::{
    LanguageBaseAttributeId, ProfileDescriptor, ProtocolDescriptor, ProtocolParameter,
    RecordStore, ServiceRecord,
};
pub use server::SdpServer;
pub use service::RemoteService;
pub use uuid::{ServiceClassId, Uuid};

/// SDP Protocol Data Unit IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SdpPduId {
    /// Error Response
    ErrorResponse = 0x01,
    /// Service Search Request
    ServiceSearchRequest = 0x02,
    /// Service Search Response
    ServiceSearchResponse = 0x03,
    /// Service Attribute Request
    ServiceAttributeRequest = 0x04,
    /// Service Attribute Response
    ServiceAttributeResponse = 0x05,
    /// Service Search Attribute Request
    ServiceSearchAttributeRequest = 0x06,
    /// Service Search Attribute Response
    ServiceSearchAttributeResponse = 0x07,
}

impl SdpPduId {
    /// Create from the wire value
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::ErrorResponse),
            0x02 => Some(Self::ServiceSearchRequest),
            0x03 => Some(Self::ServiceSearchResponse),
            0x04 => Some(Self::ServiceAttributeRequest),
            0x05 => Some(Self::ServiceAttributeResponse),
            0x06 => Some(Self::ServiceSearchAttributeRequest),
            0x07 => Some(Self::ServiceSearchAttributeResponse),
            _ => None,
        }
    }

    /// The response PDU that answers this request PDU
    #[must_use]
    pub const fn response(self) -> Option<Self> {
        match self {
            Self::ServiceSearchRequest => Some(Self::ServiceSearchResponse),
            Self::ServiceAttributeRequest => Some(Self::ServiceAttributeResponse),
            Self::ServiceSearchAttributeRequest => Some(Self::ServiceSearchAttributeResponse),
            _ => None,
        }
    }
}

/// SDP Error Codes carried by an `ErrorResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum SdpErrorCode {
    /// Invalid/unsupported SDP version
    InvalidVersion = 0x0001,
    /// Invalid Service Record Handle
    InvalidServiceRecordHandle = 0x0002,
    /// Invalid request syntax
    InvalidRequestSyntax = 0x0003,
    /// Invalid PDU size
    InvalidPduSize = 0x0004,
    /// Invalid continuation state
    InvalidContinuationState = 0x0005,
    /// Insufficient resources to satisfy request
    InsufficientResources = 0x0006,
}

impl SdpErrorCode {
    /// Create from the wire value
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::InvalidVersion),
            0x0002 => Some(Self::InvalidServiceRecordHandle),
            0x0003 => Some(Self::InvalidRequestSyntax),
            0x0004 => Some(Self::InvalidPduSize),
            0x0005 => Some(Self::InvalidContinuationState),
            0x0006 => Some(Self::InsufficientResources),
            _ => None,
        }
    }
}

impl core::fmt::Display for SdpErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidVersion => write!(f, "Invalid SDP version"),
            Self::InvalidServiceRecordHandle => write!(f, "Invalid service record handle"),
            Self::InvalidRequestSyntax => write!(f, "Invalid request syntax"),
            Self::InvalidPduSize => write!(f, "Invalid PDU size"),
            Self::InvalidContinuationState => write!(f, "Invalid continuation state"),
            Self::InsufficientResources => write!(f, "Insufficient resources"),
        }
    }
}

/// SDP Error Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdpError {
    /// No service record with the given handle exists
    UnknownRecord,
    /// The record is registered and cannot be modified or destroyed
    StillRegistered,
    /// The record is already registered
    AlreadyRegistered,
    /// The record is not registered
    NotRegistered,
    /// The attribute ID already exists on the record
    DuplicateAttribute,
    /// The value or record exceeds its byte or entry budget
    TooLarge,
    /// The record store is full
    TooManyRecords,
    /// Invalid parameter provided by the caller
    InvalidParameter,
    /// A bounded queue or table is full
    QueueFull,
    /// Data Element encoding or decoding failed
    Codec(CodecError),
    /// Protocol error reported by or to the remote device
    Protocol(SdpErrorCode),
    /// The transport refused an operation
    Transport(TransportError),
}

impl core::fmt::Display for SdpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownRecord => write!(f, "Unknown service record"),
            Self::StillRegistered => write!(f, "Service record is registered"),
            Self::AlreadyRegistered => write!(f, "Service record already registered"),
            Self::NotRegistered => write!(f, "Service record not registered"),
            Self::DuplicateAttribute => write!(f, "Duplicate attribute ID"),
            Self::TooLarge => write!(f, "Attribute data exceeds record capacity"),
            Self::TooManyRecords => write!(f, "Service record store is full"),
            Self::InvalidParameter => write!(f, "Invalid parameter"),
            Self::QueueFull => write!(f, "Queue is full"),
            Self::Codec(e) => write!(f, "Data element error: {e}"),
            Self::Protocol(code) => write!(f, "SDP protocol error: {code}"),
            Self::Transport(e) => write!(f, "Transport error: {e}"),
        }
    }
}

impl From<SdpErrorCode> for SdpError {
    fn from(code: SdpErrorCode) -> Self {
        Self::Protocol(code)
    }
}

impl From<CodecError> for SdpError {
    fn from(error: CodecError) -> Self {
        Self::Codec(error)
    }
}

impl From<TransportError> for SdpError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_id_round_trip() {
        for raw in 0x01..=0x07u8 {
            let pdu = SdpPduId::from_u8(raw).unwrap();
            assert_eq!(pdu as u8, raw);
        }
        assert_eq!(SdpPduId::from_u8(0x00), None);
        assert_eq!(SdpPduId::from_u8(0x08), None);
    }

    #[test]
    fn test_request_response_pairing() {
        assert_eq!(
            SdpPduId::ServiceSearchRequest.response(),
            Some(SdpPduId::ServiceSearchResponse)
        );
        assert_eq!(
            SdpPduId::ServiceSearchAttributeRequest.response(),
            Some(SdpPduId::ServiceSearchAttributeResponse)
        );
        assert_eq!(SdpPduId::ErrorResponse.response(), None);
    }

    #[test]
    fn test_error_code_values() {
        assert_eq!(SdpErrorCode::from_u16(0x0005), Some(SdpErrorCode::InvalidContinuationState));
        assert_eq!(SdpErrorCode::InsufficientResources as u16, 0x0006);
        assert_eq!(SdpErrorCode::from_u16(0x0000), None);
    }

    #[test]
    fn test_error_conversions() {
        let err: SdpError = SdpErrorCode::InvalidPduSize.into();
        assert_eq!(err, SdpError::Protocol(SdpErrorCode::InvalidPduSize));
        let err: SdpError = CodecError::MalformedLength.into();
        assert_eq!(err, SdpError::Codec(CodecError::MalformedLength));
    }
}

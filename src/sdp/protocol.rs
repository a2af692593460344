//! SDP Protocol Implementation
//!
//! This module implements the SDP PDU formats: the 5-byte header, the
//! continuation field, request parameter parsing (server side) and encoding
//! (client side), and response building (server side) and parsing (client side).

use super::attribute::AttributeSelector;
use super::cursor::{ByteSink, Reader};
use super::element::{CodecError, DataElement, SequenceBuilder};
use super::uuid::Uuid;
use super::{SdpErrorCode, SdpPduId, ServiceRecordHandle, TransactionId};
use crate::constants::{MAX_CONTINUATION_STATE_LENGTH, MAX_PDU_SIZE, MAX_UUID_PATTERN, PDU_HEADER_LENGTH};
use heapless::Vec;

/// One complete SDP PDU (header and parameters)
pub type PduBuffer = Vec<u8, MAX_PDU_SIZE>;

/// UUIDs of a service search pattern
pub type SearchPattern = Vec<Uuid, MAX_UUID_PATTERN>;

/// SDP PDU Header
///
/// All SDP messages start with this 5-byte header containing the PDU ID,
/// transaction ID, and parameter length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SdpPduHeader {
    /// Raw PDU identifier (unknown values are kept so they can be answered)
    pub pdu_id: u8,
    /// Transaction identifier
    pub transaction_id: TransactionId,
    /// Length of parameters following the header
    pub parameter_length: u16,
}

impl SdpPduHeader {
    /// Create a header
    #[must_use]
    pub const fn new(pdu_id: SdpPduId, transaction_id: TransactionId, parameter_length: u16) -> Self {
        Self {
            pdu_id: pdu_id as u8,
            transaction_id,
            parameter_length,
        }
    }

    /// The PDU kind, if known
    #[must_use]
    pub const fn pdu(&self) -> Option<SdpPduId> {
        SdpPduId::from_u8(self.pdu_id)
    }

    /// Encode header to bytes
    #[must_use]
    pub const fn encode(&self) -> [u8; PDU_HEADER_LENGTH] {
        let txid = self.transaction_id.to_be_bytes();
        let len = self.parameter_length.to_be_bytes();
        [self.pdu_id, txid[0], txid[1], len[0], len[1]]
    }

    /// Split a PDU into its header and parameters
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if the header is truncated. The parameter length is
    /// not checked here; see [`SdpPduHeader::check_length`].
    pub fn decode(pdu: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let mut reader = Reader::new(pdu);
        let header = Self {
            pdu_id: reader.read_u8()?,
            transaction_id: reader.read_u16()?,
            parameter_length: reader.read_u16()?,
        };
        Ok((header, reader.rest()))
    }

    /// Whether the declared parameter length matches the received parameters exactly
    #[must_use]
    pub fn check_length(&self, parameters: &[u8]) -> bool {
        usize::from(self.parameter_length) == parameters.len()
    }
}

/// Continuation state field: up to 16 opaque bytes, empty when complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContinuationState {
    len: u8,
    bytes: [u8; MAX_CONTINUATION_STATE_LENGTH],
}

impl ContinuationState {
    /// The empty (final) continuation state
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; MAX_CONTINUATION_STATE_LENGTH],
    };

    /// Create from opaque bytes
    ///
    /// # Errors
    ///
    /// Returns `InvalidContinuationState` for more than 16 bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SdpErrorCode> {
        if data.len() > MAX_CONTINUATION_STATE_LENGTH {
            return Err(SdpErrorCode::InvalidContinuationState);
        }
        let mut state = Self::EMPTY;
        state.bytes[..data.len()].copy_from_slice(data);
        state.len = data.len() as u8;
        Ok(state)
    }

    /// Opaque state bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Whether this marks the final fragment
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Encoded size of the field (length byte included)
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        1 + self.len as usize
    }

    /// Read the field from the end of a parameter block
    ///
    /// # Errors
    ///
    /// Returns `InvalidContinuationState` if the declared length exceeds 16 and
    /// `InvalidPduSize` if the field is truncated.
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, SdpErrorCode> {
        let len = reader.read_u8().map_err(|_| SdpErrorCode::InvalidPduSize)?;
        if usize::from(len) > MAX_CONTINUATION_STATE_LENGTH {
            return Err(SdpErrorCode::InvalidContinuationState);
        }
        let data = reader
            .take(usize::from(len))
            .map_err(|_| SdpErrorCode::InvalidPduSize)?;
        Self::from_bytes(data)
    }

    /// Write the field
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if `out` is full.
    pub fn write<S: ByteSink>(&self, out: &mut S) -> Result<(), CodecError> {
        out.put_u8(self.len)?;
        out.put(self.as_bytes())
    }
}

/// Build a complete PDU; `write_parameters` appends the parameters after the header
///
/// # Errors
///
/// Returns `BufferFull` if the PDU exceeds `MAX_PDU_SIZE`.
pub fn build_pdu<F>(
    pdu_id: SdpPduId,
    transaction_id: TransactionId,
    write_parameters: F,
) -> Result<PduBuffer, CodecError>
where
    F: FnOnce(&mut PduBuffer) -> Result<(), CodecError>,
{
    let mut pdu = PduBuffer::new();
    pdu.put(&SdpPduHeader::new(pdu_id, transaction_id, 0).encode())?;
    write_parameters(&mut pdu)?;
    let parameter_length =
        u16::try_from(pdu.len() - PDU_HEADER_LENGTH).map_err(|_| CodecError::BufferFull)?;
    pdu[3..PDU_HEADER_LENGTH].copy_from_slice(&parameter_length.to_be_bytes());
    Ok(pdu)
}

/// Build an `ErrorResponse`
///
/// # Errors
///
/// Never fails in practice; the PDU is 7 bytes.
pub fn error_response(
    transaction_id: TransactionId,
    code: SdpErrorCode,
) -> Result<PduBuffer, CodecError> {
    build_pdu(SdpPduId::ErrorResponse, transaction_id, |out| {
        out.put_u16(code as u16)
    })
}

/// Read a service search pattern operand
fn read_pattern(reader: &mut Reader<'_>) -> Result<SearchPattern, SdpErrorCode> {
    let element = DataElement::read(reader).map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;
    let children = element
        .expect_sequence()
        .map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;
    let mut pattern = SearchPattern::new();
    for child in children {
        let uuid = child
            .and_then(|c| c.expect_uuid())
            .map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;
        pattern
            .push(uuid)
            .map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;
    }
    if pattern.is_empty() {
        return Err(SdpErrorCode::InvalidRequestSyntax);
    }
    Ok(pattern)
}

fn read_selector(reader: &mut Reader<'_>) -> Result<AttributeSelector, SdpErrorCode> {
    let element = DataElement::read(reader).map_err(|_| SdpErrorCode::InvalidRequestSyntax)?;
    AttributeSelector::parse(&element)
}

fn syntax<T>(result: Result<T, CodecError>) -> Result<T, SdpErrorCode> {
    result.map_err(|_| SdpErrorCode::InvalidRequestSyntax)
}

/// A parsed request PDU (server side)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdpRequest {
    /// `ServiceSearchRequest`
    ServiceSearch {
        /// UUIDs to look for
        pattern: SearchPattern,
        /// Maximum number of handles to return
        max_record_count: u16,
    },
    /// `ServiceAttributeRequest`
    ServiceAttribute {
        /// Record to read
        handle: ServiceRecordHandle,
        /// Maximum attribute bytes per response PDU
        max_byte_count: u16,
        /// Attributes to return
        selector: AttributeSelector,
    },
    /// `ServiceSearchAttributeRequest`
    ServiceSearchAttribute {
        /// UUIDs to look for
        pattern: SearchPattern,
        /// Maximum attribute bytes per response PDU
        max_byte_count: u16,
        /// Attributes to return per matching record
        selector: AttributeSelector,
    },
}

impl SdpRequest {
    /// The PDU kind of this request
    #[must_use]
    pub const fn pdu(&self) -> SdpPduId {
        match self {
            Self::ServiceSearch { .. } => SdpPduId::ServiceSearchRequest,
            Self::ServiceAttribute { .. } => SdpPduId::ServiceAttributeRequest,
            Self::ServiceSearchAttribute { .. } => SdpPduId::ServiceSearchAttributeRequest,
        }
    }

    /// Parse request parameters (the bytes after the header)
    ///
    /// # Errors
    ///
    /// Returns the error code to send back: `InvalidRequestSyntax` for malformed or
    /// unknown requests, `InvalidContinuationState` for an oversized continuation field,
    /// `InvalidPduSize` for a truncated continuation field.
    pub fn parse(pdu_id: u8, parameters: &[u8]) -> Result<(Self, ContinuationState), SdpErrorCode> {
        let mut reader = Reader::new(parameters);
        let request = match SdpPduId::from_u8(pdu_id) {
            Some(SdpPduId::ServiceSearchRequest) => {
                let pattern = read_pattern(&mut reader)?;
                let max_record_count = syntax(reader.read_u16())?;
                Self::ServiceSearch {
                    pattern,
                    max_record_count,
                }
            }
            Some(SdpPduId::ServiceAttributeRequest) => {
                let handle = syntax(reader.read_u32())?;
                let max_byte_count = syntax(reader.read_u16())?;
                let selector = read_selector(&mut reader)?;
                Self::ServiceAttribute {
                    handle,
                    max_byte_count,
                    selector,
                }
            }
            Some(SdpPduId::ServiceSearchAttributeRequest) => {
                let pattern = read_pattern(&mut reader)?;
                let max_byte_count = syntax(reader.read_u16())?;
                let selector = read_selector(&mut reader)?;
                Self::ServiceSearchAttribute {
                    pattern,
                    max_byte_count,
                    selector,
                }
            }
            _ => return Err(SdpErrorCode::InvalidRequestSyntax),
        };

        let continuation = ContinuationState::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(SdpErrorCode::InvalidPduSize);
        }
        match request {
            Self::ServiceSearch {
                max_record_count: 0,
                ..
            }
            | Self::ServiceAttribute {
                max_byte_count: 0, ..
            }
            | Self::ServiceSearchAttribute {
                max_byte_count: 0, ..
            } => Err(SdpErrorCode::InvalidRequestSyntax),
            request => Ok((request, continuation)),
        }
    }

    /// Encode the request parameters, without the continuation field
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if `out` cannot hold the parameters.
    pub fn encode_parameters<S: ByteSink>(&self, out: &mut S) -> Result<(), CodecError> {
        match self {
            Self::ServiceSearch {
                pattern,
                max_record_count,
            } => {
                write_pattern(pattern, out)?;
                out.put_u16(*max_record_count)
            }
            Self::ServiceAttribute {
                handle,
                max_byte_count,
                selector,
            } => {
                out.put_u32(*handle)?;
                out.put_u16(*max_byte_count)?;
                selector.encode(out)
            }
            Self::ServiceSearchAttribute {
                pattern,
                max_byte_count,
                selector,
            } => {
                write_pattern(pattern, out)?;
                out.put_u16(*max_byte_count)?;
                selector.encode(out)
            }
        }
    }
}

fn write_pattern<S: ByteSink>(pattern: &[Uuid], out: &mut S) -> Result<(), CodecError> {
    let mut seq: SequenceBuilder<{ MAX_UUID_PATTERN * 17 }> = SequenceBuilder::new();
    for uuid in pattern {
        seq.push(&DataElement::Uuid(*uuid))?;
    }
    seq.finish(out)
}

/// A parsed response PDU (client side)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpResponse<'a> {
    /// `ErrorResponse` with its raw error code
    Error(u16),
    /// One fragment of a `ServiceSearchResponse`
    ServiceSearch {
        /// Total matching records across all fragments
        total: u16,
        /// Handles in this fragment
        current: u16,
        /// `current` big-endian 32-bit handles
        handles: &'a [u8],
        /// Continuation state to echo back
        continuation: ContinuationState,
    },
    /// One fragment of an attribute list (`ServiceAttributeResponse` or
    /// `ServiceSearchAttributeResponse`)
    AttributeList {
        /// Response PDU kind
        pdu: SdpPduId,
        /// Bytes of the attribute list in this fragment
        list: &'a [u8],
        /// Continuation state to echo back
        continuation: ContinuationState,
    },
}

impl<'a> SdpResponse<'a> {
    /// Parse response parameters (the bytes after the header)
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` for request PDUs or unknown IDs, `MalformedLength` when a
    /// count disagrees with the bytes present.
    pub fn parse(pdu_id: u8, parameters: &'a [u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(parameters);
        let response = match SdpPduId::from_u8(pdu_id) {
            Some(SdpPduId::ErrorResponse) => Self::Error(reader.read_u16()?),
            Some(SdpPduId::ServiceSearchResponse) => {
                let total = reader.read_u16()?;
                let current = reader.read_u16()?;
                if current > total {
                    return Err(CodecError::MalformedLength);
                }
                let handles = reader.take(usize::from(current) * 4)?;
                let continuation = read_response_continuation(&mut reader)?;
                Self::ServiceSearch {
                    total,
                    current,
                    handles,
                    continuation,
                }
            }
            Some(pdu @ (SdpPduId::ServiceAttributeResponse | SdpPduId::ServiceSearchAttributeResponse)) => {
                let count = reader.read_u16()?;
                let list = reader.take(usize::from(count))?;
                let continuation = read_response_continuation(&mut reader)?;
                Self::AttributeList {
                    pdu,
                    list,
                    continuation,
                }
            }
            _ => return Err(CodecError::UnexpectedKind),
        };
        if !reader.is_empty() && !matches!(response, Self::Error(_)) {
            return Err(CodecError::MalformedLength);
        }
        Ok(response)
    }
}

fn read_response_continuation(reader: &mut Reader<'_>) -> Result<ContinuationState, CodecError> {
    ContinuationState::read(reader).map_err(|_| CodecError::MalformedLength)
}

/// Write `ServiceSearchResponse` parameters
///
/// # Errors
///
/// Returns `BufferFull` if `out` is full.
pub fn write_search_response<S: ByteSink>(
    out: &mut S,
    total: u16,
    handles: &[u8],
    continuation: &ContinuationState,
) -> Result<(), CodecError> {
    let current = u16::try_from(handles.len() / 4).map_err(|_| CodecError::BufferFull)?;
    out.put_u16(total)?;
    out.put_u16(current)?;
    out.put(handles)?;
    continuation.write(out)
}

/// Write attribute list response parameters
///
/// # Errors
///
/// Returns `BufferFull` if `out` is full.
pub fn write_attribute_response<S: ByteSink>(
    out: &mut S,
    list: &[u8],
    continuation: &ContinuationState,
) -> Result<(), CodecError> {
    let count = u16::try_from(list.len()).map_err(|_| CodecError::BufferFull)?;
    out.put_u16(count)?;
    out.put(list)?;
    continuation.write(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = SdpPduHeader::new(SdpPduId::ServiceAttributeRequest, 0x1234, 0x0011);
        let bytes = header.encode();
        assert_eq!(bytes, [0x04, 0x12, 0x34, 0x00, 0x11]);
        let (decoded, rest) = SdpPduHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert!(rest.is_empty());
        assert!(!decoded.check_length(rest));
        assert_eq!(SdpPduHeader::decode(&bytes[..4]), Err(CodecError::MalformedLength));
    }

    #[test]
    fn test_continuation_field() {
        let state = ContinuationState::from_bytes(&[0x01, 0x02]).unwrap();
        let mut out: Vec<u8, 20> = Vec::new();
        state.write(&mut out).unwrap();
        assert_eq!(&out[..], &[0x02, 0x01, 0x02]);

        let mut reader = Reader::new(&out);
        assert_eq!(ContinuationState::read(&mut reader).unwrap(), state);
        assert!(ContinuationState::EMPTY.is_empty());
        assert_eq!(
            ContinuationState::from_bytes(&[0; 17]),
            Err(SdpErrorCode::InvalidContinuationState)
        );

        let oversized = [17u8, 0, 0];
        assert_eq!(
            ContinuationState::read(&mut Reader::new(&oversized)),
            Err(SdpErrorCode::InvalidContinuationState)
        );
    }

    #[test]
    fn test_error_response_layout() {
        let pdu = error_response(0x0007, SdpErrorCode::InvalidPduSize).unwrap();
        assert_eq!(&pdu[..], &[0x01, 0x00, 0x07, 0x00, 0x02, 0x00, 0x04]);
    }

    #[test]
    fn test_parse_search_request() {
        let params = [
            0x35, 0x03, 0x19, 0x11, 0x01, // pattern
            0x00, 0x05, // max count
            0x00, // continuation
        ];
        let (request, continuation) = SdpRequest::parse(0x02, &params).unwrap();
        assert!(continuation.is_empty());
        match request {
            SdpRequest::ServiceSearch {
                pattern,
                max_record_count,
            } => {
                assert_eq!(&pattern[..], &[Uuid::Uuid16(0x1101)]);
                assert_eq!(max_record_count, 5);
            }
            _ => panic!("wrong request kind"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_requests() {
        // Non-UUID in pattern
        let params = [0x35, 0x02, 0x08, 0x01, 0x00, 0x05, 0x00];
        assert_eq!(
            SdpRequest::parse(0x02, &params),
            Err(SdpErrorCode::InvalidRequestSyntax)
        );
        // Empty pattern
        let params = [0x35, 0x00, 0x00, 0x05, 0x00];
        assert_eq!(
            SdpRequest::parse(0x02, &params),
            Err(SdpErrorCode::InvalidRequestSyntax)
        );
        // Unknown or response PDU
        assert_eq!(
            SdpRequest::parse(0x03, &[]),
            Err(SdpErrorCode::InvalidRequestSyntax)
        );
        assert_eq!(
            SdpRequest::parse(0x42, &[]),
            Err(SdpErrorCode::InvalidRequestSyntax)
        );
        // Continuation longer than 16 bytes
        let params = [0x35, 0x03, 0x19, 0x11, 0x01, 0x00, 0x05, 0x11];
        assert_eq!(
            SdpRequest::parse(0x02, &params),
            Err(SdpErrorCode::InvalidContinuationState)
        );
        // Zero maximum count
        let params = [0x35, 0x03, 0x19, 0x11, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(
            SdpRequest::parse(0x02, &params),
            Err(SdpErrorCode::InvalidRequestSyntax)
        );
    }

    #[test]
    fn test_pattern_limit() {
        let mut params: Vec<u8, 64> = Vec::new();
        params.extend_from_slice(&[0x35, 39]).unwrap();
        for i in 0..13u8 {
            params.extend_from_slice(&[0x19, 0x11, i]).unwrap();
        }
        params.extend_from_slice(&[0x00, 0x01, 0x00]).unwrap();
        assert_eq!(
            SdpRequest::parse(0x02, &params),
            Err(SdpErrorCode::InvalidRequestSyntax)
        );
    }

    #[test]
    fn test_request_encode_parse_agree() {
        let request = SdpRequest::ServiceSearchAttribute {
            pattern: Vec::from_slice(&[Uuid::Uuid16(0x110B), Uuid::Uuid16(0x0100)]).unwrap(),
            max_byte_count: 0x0200,
            selector: AttributeSelector::list(&[0x0001, 0x0004]).unwrap(),
        };
        let mut params: Vec<u8, 64> = Vec::new();
        request.encode_parameters(&mut params).unwrap();
        ContinuationState::EMPTY.write(&mut params).unwrap();

        let (parsed, continuation) = SdpRequest::parse(0x06, &params).unwrap();
        assert_eq!(parsed, request);
        assert!(continuation.is_empty());
    }

    #[test]
    fn test_parse_search_response() {
        let params = [
            0x00, 0x02, 0x00, 0x01, // total, current
            0x00, 0x01, 0x00, 0x00, // handle
            0x01, 0x04, // continuation
        ];
        match SdpResponse::parse(0x03, &params).unwrap() {
            SdpResponse::ServiceSearch {
                total,
                current,
                handles,
                continuation,
            } => {
                assert_eq!((total, current), (2, 1));
                assert_eq!(handles, &[0x00, 0x01, 0x00, 0x00]);
                assert_eq!(continuation.as_bytes(), &[0x04]);
            }
            _ => panic!("wrong response kind"),
        }
        // current greater than total
        let params = [0x00, 0x01, 0x00, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0x00];
        assert_eq!(
            SdpResponse::parse(0x03, &params),
            Err(CodecError::MalformedLength)
        );
    }

    #[test]
    fn test_parse_attribute_response_length_mismatch() {
        // Byte count claims more bytes than present
        let params = [0x00, 0x09, 0x35, 0x03, 0x09, 0x00, 0x00];
        assert_eq!(
            SdpResponse::parse(0x05, &params),
            Err(CodecError::MalformedLength)
        );
        // Trailing bytes after the continuation field
        let params = [0x00, 0x02, 0x35, 0x00, 0x00, 0xFF];
        assert_eq!(
            SdpResponse::parse(0x05, &params),
            Err(CodecError::MalformedLength)
        );
    }

    #[test]
    fn test_build_search_response() {
        let pdu = build_pdu(SdpPduId::ServiceSearchResponse, 0x0042, |out| {
            write_search_response(
                out,
                1,
                &[0x00, 0x01, 0x00, 0x00],
                &ContinuationState::EMPTY,
            )
        })
        .unwrap();
        assert_eq!(
            &pdu[..],
            &[0x03, 0x00, 0x42, 0x00, 0x09, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
    }
}

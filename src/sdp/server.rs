//! SDP Server Implementation
//!
//! This module answers inbound SDP requests from the local [`RecordStore`].
//! One request PDU is handled at a time per connection; responses that do not
//! fit the peer's MTU are split and the remainder is kept in the connection's
//! [`PendingFragment`] until the peer asks for it with the continuation token.

use super::attribute::AttributeSelector;
use super::cursor::ByteSink;
use super::element::{CodecError, DataElementSize, DataElementType, encode_variable_header};
use super::fragment::{PendingFragment, ResponseBuffer};
use super::protocol::{
    ContinuationState, PduBuffer, SdpPduHeader, SdpRequest, build_pdu, error_response,
    write_attribute_response, write_search_response,
};
use super::record::{RecordStore, ServiceRecord};
use super::uuid::Uuid;
use super::{SdpErrorCode, SdpPduId, ServiceRecordHandle, TransactionId};
use crate::constants::{
    CONTINUATION_FIELD_RESERVE, MAX_PDU_SIZE, MAX_SERVICE_RECORDS, PDU_HEADER_LENGTH,
};
use heapless::Vec;

/// Handles of matching records, in store order
pub type HandleList = Vec<ServiceRecordHandle, MAX_SERVICE_RECORDS>;

/// Size of the total and current record count fields of a search response
const SEARCH_COUNTS_LENGTH: usize = 4;

/// Size of the byte count field of an attribute response
const ATTRIBUTE_COUNT_LENGTH: usize = 2;

/// SDP Server
///
/// Owns the local service record database and turns request PDUs into
/// response PDUs.
#[derive(Debug, Default)]
pub struct SdpServer {
    store: RecordStore,
}

impl SdpServer {
    /// Create a server with an empty record store
    #[must_use]
    pub const fn new() -> Self {
        Self {
            store: RecordStore::new(),
        }
    }

    /// Local service records
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Local service records, mutable
    pub const fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    /// Handles of registered records containing any of `pattern`, at most `max_count`
    #[must_use]
    pub fn search_services(&self, pattern: &[Uuid], max_count: u16) -> HandleList {
        let mut handles = HandleList::new();
        for record in self.store.registered() {
            if handles.len() >= usize::from(max_count) {
                break;
            }
            if record.contains_any_uuid(pattern) && handles.push(record.handle()).is_err() {
                break;
            }
        }
        handles
    }

    /// Answer one inbound PDU
    ///
    /// `pending` is the connection's unsent response remainder and `mtu` the
    /// peer's receive MTU. Malformed requests are answered with an `ErrorResponse`.
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` only if a response PDU cannot be built, which the
    /// chunk sizing rules out.
    pub fn handle_request(
        &self,
        pending: &mut Option<PendingFragment>,
        mtu: u16,
        pdu: &[u8],
    ) -> Result<PduBuffer, CodecError> {
        let Ok((header, parameters)) = SdpPduHeader::decode(pdu) else {
            warn!("[SERVER] Truncated PDU of {} bytes", pdu.len());
            return error_response(0, SdpErrorCode::InvalidPduSize);
        };
        let txid = header.transaction_id;
        if !header.check_length(parameters) {
            warn!(
                "[SERVER] Parameter length {} does not match {} received bytes",
                header.parameter_length,
                parameters.len()
            );
            return error_response(txid, SdpErrorCode::InvalidPduSize);
        }

        let (request, continuation) = match SdpRequest::parse(header.pdu_id, parameters) {
            Ok(parsed) => parsed,
            Err(code) => {
                warn!("[SERVER] Rejecting PDU {:#x}: {:?}", header.pdu_id, code);
                return error_response(txid, code);
            }
        };
        let response_pdu = request.pdu().response().unwrap_or(SdpPduId::ErrorResponse);

        if continuation.is_empty() {
            *pending = None;
            match self.prepare(&request) {
                Ok(fragment) => *pending = Some(fragment),
                Err(code) => {
                    warn!("[SERVER] Request failed: {:?}", code);
                    return error_response(txid, code);
                }
            }
        } else {
            let resumes = pending
                .as_ref()
                .is_some_and(|fragment| fragment.resumes(response_pdu, &continuation));
            if !resumes {
                warn!("[SERVER] Continuation does not match the pending response");
                *pending = None;
                return error_response(txid, SdpErrorCode::InvalidContinuationState);
            }
            debug!("[SERVER] Resuming fragmented response");
        }

        let Some(fragment) = pending.as_mut() else {
            return error_response(txid, SdpErrorCode::InsufficientResources);
        };
        let response = send_chunk(fragment, &request, mtu, txid)?;
        if fragment.is_complete() {
            *pending = None;
        }
        Ok(response)
    }

    /// Compute the full response payload of a fresh request
    fn prepare(&self, request: &SdpRequest) -> Result<PendingFragment, SdpErrorCode> {
        let mut data = ResponseBuffer::new();
        match request {
            SdpRequest::ServiceSearch {
                pattern,
                max_record_count,
            } => {
                let handles = self.search_services(pattern, *max_record_count);
                for handle in &handles {
                    data.put_u32(*handle)
                        .map_err(|_| SdpErrorCode::InsufficientResources)?;
                }
                debug!("[SERVER] Service search matched {} records", handles.len());
                let total = u16::try_from(handles.len())
                    .map_err(|_| SdpErrorCode::InsufficientResources)?;
                Ok(PendingFragment::new(SdpPduId::ServiceSearchResponse, total, data))
            }
            SdpRequest::ServiceAttribute {
                handle, selector, ..
            } => {
                let record = self
                    .store
                    .record(*handle)
                    .filter(|record| record.is_registered())
                    .ok_or(SdpErrorCode::InvalidServiceRecordHandle)?;
                write_attribute_list(record, selector, &mut data)
                    .map_err(|_| SdpErrorCode::InsufficientResources)?;
                debug!(
                    "[SERVER] Attribute response for {:#x}: {} bytes",
                    *handle,
                    data.len()
                );
                Ok(PendingFragment::new(SdpPduId::ServiceAttributeResponse, 0, data))
            }
            SdpRequest::ServiceSearchAttribute {
                pattern, selector, ..
            } => {
                let handles = self.search_services(pattern, u16::MAX);
                let records = handles
                    .iter()
                    .filter_map(|handle| self.store.record(*handle))
                    .filter(|record| selected_len(record, selector) > 0);

                let outer_len: usize = records
                    .clone()
                    .map(|record| sequence_len(selected_len(record, selector)))
                    .sum();
                encode_variable_header(DataElementType::Sequence, outer_len, &mut data)
                    .map_err(|_| SdpErrorCode::InsufficientResources)?;
                for record in records {
                    write_attribute_list(record, selector, &mut data)
                        .map_err(|_| SdpErrorCode::InsufficientResources)?;
                }
                debug!(
                    "[SERVER] Search attribute response: {} records, {} bytes",
                    handles.len(),
                    data.len()
                );
                Ok(PendingFragment::new(
                    SdpPduId::ServiceSearchAttributeResponse,
                    0,
                    data,
                ))
            }
        }
    }
}

/// Bytes of the selected attributes, ID elements included
fn selected_len(record: &ServiceRecord, selector: &AttributeSelector) -> usize {
    record
        .attributes()
        .filter(|entry| selector.matches(entry.id))
        .map(|entry| entry.encoded().len())
        .sum()
}

/// Encoded size of a sequence with `content_len` bytes of content
const fn sequence_len(content_len: usize) -> usize {
    1 + DataElementSize::for_length(content_len).length_field_size() + content_len
}

/// Write the selected attributes of `record` as one sequence
fn write_attribute_list<S: ByteSink>(
    record: &ServiceRecord,
    selector: &AttributeSelector,
    out: &mut S,
) -> Result<(), CodecError> {
    encode_variable_header(
        DataElementType::Sequence,
        selected_len(record, selector),
        out,
    )?;
    for entry in record
        .attributes()
        .filter(|entry| selector.matches(entry.id))
    {
        out.put(entry.encoded())?;
    }
    Ok(())
}

/// Send the next chunk of `fragment`, sized by the MTU and the request's limits
fn send_chunk(
    fragment: &mut PendingFragment,
    request: &SdpRequest,
    mtu: u16,
    txid: TransactionId,
) -> Result<PduBuffer, CodecError> {
    let mtu = usize::from(mtu).min(MAX_PDU_SIZE);
    let pdu = fragment.pdu();
    match *request {
        SdpRequest::ServiceSearch {
            max_record_count, ..
        } => {
            let per_packet = (mtu
                .saturating_sub(PDU_HEADER_LENGTH + SEARCH_COUNTS_LENGTH + CONTINUATION_FIELD_RESERVE)
                / 4)
            .min(usize::from(max_record_count))
            .max(1);
            let total = fragment.total_records();
            let mut chunk: Vec<u8, MAX_PDU_SIZE> = Vec::new();
            chunk.put(fragment.take(per_packet * 4))?;
            let continuation = fragment.token();
            build_pdu(pdu, txid, |out| {
                write_search_response(out, total, &chunk, &continuation)
            })
        }
        SdpRequest::ServiceAttribute { max_byte_count, .. }
        | SdpRequest::ServiceSearchAttribute { max_byte_count, .. } => {
            let per_packet = mtu
                .saturating_sub(PDU_HEADER_LENGTH + ATTRIBUTE_COUNT_LENGTH + CONTINUATION_FIELD_RESERVE)
                .min(usize::from(max_byte_count))
                .max(1);
            let mut chunk: Vec<u8, MAX_PDU_SIZE> = Vec::new();
            chunk.put(fragment.take(per_packet))?;
            let continuation: ContinuationState = fragment.token();
            build_pdu(pdu, txid, |out| {
                write_attribute_response(out, &chunk, &continuation)
            })
        }
    }
}

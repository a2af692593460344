//! SDP Client Implementation
//!
//! This module keeps the outbound request queue. Requests are kept in arrival
//! order; for each peer only the oldest request may be on the air, the others
//! wait as `Waiting`. Fragmented responses are reassembled by re-sending the
//! request with the continuation state the server returned, under the same
//! transaction ID, until the state comes back empty. The result is then
//! decoded and handed to the request's callback.

use super::cursor::ByteSink;
use super::fragment::Reassembly;
use super::protocol::{ContinuationState, PduBuffer, SdpPduHeader, SdpRequest, SdpResponse, build_pdu};
use super::service::{RemoteService, parse_service_list};
use super::{CodecError, SdpError, SdpErrorCode, SdpPduId, ServiceRecordHandle, TransactionId};
use crate::BluetoothAddress;
use crate::constants::{
    FIRST_RECORD_HANDLE, MAX_ATTRIBUTE_IDS, MAX_CLIENT_REQUESTS, MAX_SEARCH_RESULTS, MAX_UUID_PATTERN,
};
use heapless::Vec;

/// Largest encoded request parameter block: pattern, byte count and attribute list
const MAX_REQUEST_PARAMETERS: usize = 3 + MAX_UUID_PATTERN * 17 + 2 + 3 + MAX_ATTRIBUTE_IDS * 3;

/// Called with the handles found by a service search; empty on failure
pub type ServiceSearchCallback = fn(&BluetoothAddress, &[ServiceRecordHandle], usize);

/// Called with the attributes of one record; `None` on failure
pub type ServiceAttributeCallback = fn(&BluetoothAddress, Option<&RemoteService<'_>>, usize);

/// Called with every matching record; empty on failure
pub type ServiceSearchAttributeCallback = fn(&BluetoothAddress, &[RemoteService<'_>], usize);

/// Request kind and the callback that receives its result
#[derive(Debug, Clone, Copy)]
pub enum RequestKind {
    /// `ServiceSearchRequest`
    ServiceSearch(ServiceSearchCallback),
    /// `ServiceAttributeRequest`
    ServiceAttribute(ServiceAttributeCallback),
    /// `ServiceSearchAttributeRequest`
    ServiceSearchAttribute(ServiceSearchAttributeCallback),
}

impl RequestKind {
    /// Request PDU
    #[must_use]
    pub const fn pdu(&self) -> SdpPduId {
        match self {
            Self::ServiceSearch(_) => SdpPduId::ServiceSearchRequest,
            Self::ServiceAttribute(_) => SdpPduId::ServiceAttributeRequest,
            Self::ServiceSearchAttribute(_) => SdpPduId::ServiceSearchAttributeRequest,
        }
    }

    /// Expected response PDU
    #[must_use]
    pub const fn response_pdu(&self) -> SdpPduId {
        match self {
            Self::ServiceSearch(_) => SdpPduId::ServiceSearchResponse,
            Self::ServiceAttribute(_) => SdpPduId::ServiceAttributeResponse,
            Self::ServiceSearchAttribute(_) => SdpPduId::ServiceSearchAttributeResponse,
        }
    }
}

/// Where a request is in its exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestState {
    /// Queued behind another request or a connection being set up
    Waiting,
    /// Sent, waiting for the first response
    Sending,
    /// Sent with a continuation state, waiting for the next fragment
    SendingFragment,
}

/// One queued request
#[derive(Debug, Clone)]
pub struct ClientRequest {
    peer: BluetoothAddress,
    kind: RequestKind,
    transaction_id: TransactionId,
    parameters: Vec<u8, MAX_REQUEST_PARAMETERS>,
    state: RequestState,
    assembled: Reassembly,
    total_records: Option<u16>,
    context: usize,
    retries: u8,
}

impl ClientRequest {
    /// Remote device
    #[must_use]
    pub const fn peer(&self) -> BluetoothAddress {
        self.peer
    }

    /// Kind and callback
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Transaction ID, kept across continuation fragments
    #[must_use]
    pub const fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Exchange state
    #[must_use]
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// Caller context passed back to the callback
    #[must_use]
    pub const fn context(&self) -> usize {
        self.context
    }

    /// Number of reconnects made for this request
    #[must_use]
    pub const fn retries(&self) -> u8 {
        self.retries
    }

    fn is_active(&self) -> bool {
        self.state != RequestState::Waiting
    }

    fn pdu(&self, continuation: &ContinuationState) -> Result<PduBuffer, SdpError> {
        let pdu = build_pdu(self.kind.pdu(), self.transaction_id, |out| {
            out.put(&self.parameters)?;
            continuation.write(out)
        })?;
        Ok(pdu)
    }

    /// Deliver the assembled result, or a failure, to the callback
    fn complete(&self, success: bool) {
        let peer = &self.peer;
        let data = self.assembled.data();
        match self.kind {
            RequestKind::ServiceSearch(callback) => {
                let handles = if success { self.handles() } else { None };
                callback(peer, handles.as_deref().unwrap_or(&[]), self.context);
            }
            RequestKind::ServiceAttribute(callback) => {
                let service = if success { RemoteService::parse(data).ok() } else { None };
                callback(peer, service.as_ref(), self.context);
            }
            RequestKind::ServiceSearchAttribute(callback) => {
                let services = if success { parse_service_list(data).ok() } else { None };
                callback(peer, services.as_deref().unwrap_or(&[]), self.context);
            }
        }
    }

    /// Decode the assembled handle list
    fn handles(&self) -> Option<Vec<ServiceRecordHandle, MAX_SEARCH_RESULTS>> {
        let data = self.assembled.data();
        let total = usize::from(self.total_records.unwrap_or(0));
        if data.len() != total * 4 {
            warn!("[CLIENT] Expected {} handles, got {} bytes", total, data.len());
            return None;
        }
        let mut handles = Vec::new();
        for chunk in data.chunks_exact(4) {
            let handle = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if handle < FIRST_RECORD_HANDLE {
                warn!("[CLIENT] Reserved record handle {:#x}", handle);
                return None;
            }
            handles.push(handle).ok()?;
        }
        Some(handles)
    }
}

/// What the caller must do after a response was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Send this continuation request
    Continue(PduBuffer),
    /// The request finished (its callback ran); the next one may start
    Complete,
    /// No request was waiting for this response
    Ignored,
}

/// SDP Client
///
/// Queues requests per peer and turns responses into callback invocations.
#[derive(Debug)]
pub struct SdpClient {
    requests: Vec<ClientRequest, MAX_CLIENT_REQUESTS>,
    next_transaction_id: TransactionId,
}

impl Default for SdpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SdpClient {
    /// Create an empty client
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requests: Vec::new(),
            next_transaction_id: 1,
        }
    }

    /// Allocate a transaction ID; cycles through `1..=0xFFFF`
    pub fn next_transaction_id(&mut self) -> TransactionId {
        let id = self.next_transaction_id;
        self.next_transaction_id = if id == u16::MAX { 1 } else { id + 1 };
        id
    }

    /// Queue a request as `Waiting`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `kind` does not match `request`, `QueueFull`
    /// when `MAX_CLIENT_REQUESTS` are queued, or `TooLarge` if the parameters do
    /// not fit.
    pub fn enqueue(
        &mut self,
        peer: BluetoothAddress,
        request: &SdpRequest,
        kind: RequestKind,
        context: usize,
    ) -> Result<TransactionId, SdpError> {
        if kind.pdu() != request.pdu() {
            return Err(SdpError::InvalidParameter);
        }
        if self.requests.is_full() {
            return Err(SdpError::QueueFull);
        }
        let mut parameters = Vec::new();
        request
            .encode_parameters(&mut parameters)
            .map_err(|_| SdpError::TooLarge)?;
        let transaction_id = self.next_transaction_id();
        self.requests
            .push(ClientRequest {
                peer,
                kind,
                transaction_id,
                parameters,
                state: RequestState::Waiting,
                assembled: Reassembly::new(),
                total_records: None,
                context,
                retries: 0,
            })
            .map_err(|_| SdpError::QueueFull)?;
        debug!("[CLIENT] Queued transaction {:#x}", transaction_id);
        Ok(transaction_id)
    }

    /// Requests in queue order
    pub fn requests(&self) -> impl Iterator<Item = &ClientRequest> + '_ {
        self.requests.iter()
    }

    /// Whether anything is queued for `peer`
    #[must_use]
    pub fn has_requests(&self, peer: BluetoothAddress) -> bool {
        self.requests.iter().any(|r| r.peer == peer)
    }

    /// Whether a request to `peer` is on the air
    #[must_use]
    pub fn is_busy(&self, peer: BluetoothAddress) -> bool {
        self.active_index(peer).is_some()
    }

    fn active_index(&self, peer: BluetoothAddress) -> Option<usize> {
        self.requests
            .iter()
            .position(|r| r.peer == peer && r.is_active())
    }

    fn head_index(&self, peer: BluetoothAddress) -> Option<usize> {
        self.requests.iter().position(|r| r.peer == peer)
    }

    /// Oldest request for `peer`
    #[must_use]
    pub fn head(&self, peer: BluetoothAddress) -> Option<&ClientRequest> {
        self.head_index(peer).map(|index| &self.requests[index])
    }

    /// Start the oldest waiting request for `peer`, unless one is already on the air
    ///
    /// Returns the PDU to send. A request whose PDU cannot be built is failed and
    /// the next one is tried.
    pub fn start_next(&mut self, peer: BluetoothAddress) -> Option<PduBuffer> {
        if self.is_busy(peer) {
            return None;
        }
        loop {
            let index = self
                .requests
                .iter()
                .position(|r| r.peer == peer && r.state == RequestState::Waiting)?;
            match self.requests[index].pdu(&ContinuationState::EMPTY) {
                Ok(pdu) => {
                    let request = &mut self.requests[index];
                    request.state = RequestState::Sending;
                    debug!(
                        "[CLIENT] Sending transaction {:#x}",
                        request.transaction_id
                    );
                    return Some(pdu);
                }
                Err(e) => {
                    error!("[CLIENT] Cannot build request: {}", e);
                    self.finish(index, false);
                }
            }
        }
    }

    /// Handle one response PDU from `peer`
    pub fn handle_response(&mut self, peer: BluetoothAddress, pdu: &[u8]) -> ResponseOutcome {
        let Some(index) = self.active_index(peer) else {
            warn!("[CLIENT] Unsolicited response");
            return ResponseOutcome::Ignored;
        };
        if let Ok((header, _)) = SdpPduHeader::decode(pdu) {
            let expected = self.requests[index].transaction_id;
            if header.transaction_id != expected {
                warn!(
                    "[CLIENT] Dropping response to transaction {:#x}, waiting for {:#x}",
                    header.transaction_id,
                    expected
                );
                return ResponseOutcome::Ignored;
            }
        }
        match self.accept_fragment(index, pdu) {
            Ok(Some(continuation)) => match self.requests[index].pdu(&continuation) {
                Ok(next) => {
                    self.requests[index].state = RequestState::SendingFragment;
                    ResponseOutcome::Continue(next)
                }
                Err(e) => {
                    error!("[CLIENT] Cannot build continuation: {}", e);
                    self.finish(index, false);
                    ResponseOutcome::Complete
                }
            },
            Ok(None) => {
                self.finish(index, true);
                ResponseOutcome::Complete
            }
            Err(e) => {
                warn!("[CLIENT] Request failed: {}", e);
                self.finish(index, false);
                ResponseOutcome::Complete
            }
        }
    }

    /// Check one response fragment and append it; returns the continuation state
    /// to send when more fragments follow
    fn accept_fragment(
        &mut self,
        index: usize,
        pdu: &[u8],
    ) -> Result<Option<ContinuationState>, SdpError> {
        let request = &mut self.requests[index];
        let (header, parameters) = SdpPduHeader::decode(pdu)?;
        if !header.check_length(parameters) {
            return Err(SdpError::Protocol(SdpErrorCode::InvalidPduSize));
        }
        let response = SdpResponse::parse(header.pdu_id, parameters)?;
        let continuation = match response {
            SdpResponse::Error(code) => {
                return Err(SdpError::Protocol(
                    SdpErrorCode::from_u16(code).unwrap_or(SdpErrorCode::InvalidRequestSyntax),
                ));
            }
            SdpResponse::ServiceSearch {
                total,
                handles,
                continuation,
                ..
            } => {
                if !matches!(request.kind, RequestKind::ServiceSearch(_)) {
                    return Err(SdpError::Codec(CodecError::UnexpectedKind));
                }
                if *request.total_records.get_or_insert(total) != total {
                    return Err(SdpError::Codec(CodecError::MalformedLength));
                }
                request
                    .assembled
                    .push(handles)
                    .map_err(|()| SdpError::Protocol(SdpErrorCode::InsufficientResources))?;
                continuation
            }
            SdpResponse::AttributeList {
                pdu,
                list,
                continuation,
            } => {
                if pdu != request.kind.response_pdu() {
                    return Err(SdpError::Codec(CodecError::UnexpectedKind));
                }
                request
                    .assembled
                    .push(list)
                    .map_err(|()| SdpError::Protocol(SdpErrorCode::InsufficientResources))?;
                continuation
            }
        };
        Ok((!continuation.is_empty()).then_some(continuation))
    }

    /// Remove the request at `index` and run its callback
    fn finish(&mut self, index: usize, success: bool) {
        let request = self.requests.remove(index);
        if success {
            debug!(
                "[CLIENT] Transaction {:#x} complete, {} bytes in {} fragments",
                request.transaction_id,
                request.assembled.data().len(),
                request.assembled.fragments()
            );
        } else {
            info!("[CLIENT] Transaction {:#x} failed", request.transaction_id);
        }
        request.complete(success);
    }

    /// Fail the oldest request for `peer`; returns whether there was one
    pub fn fail_head(&mut self, peer: BluetoothAddress) -> bool {
        match self.head_index(peer) {
            Some(index) => {
                self.finish(index, false);
                true
            }
            None => false,
        }
    }

    /// Fail every request for `peer`
    pub fn fail_all(&mut self, peer: BluetoothAddress) {
        while self.fail_head(peer) {}
    }

    /// Put the request on the air back to `Waiting` for a reconnect and count the retry
    ///
    /// Returns the new retry count of the oldest request, if any.
    pub fn requeue(&mut self, peer: BluetoothAddress) -> Option<u8> {
        if let Some(index) = self.active_index(peer) {
            let request = &mut self.requests[index];
            request.state = RequestState::Waiting;
            request.assembled.clear();
            request.total_records = None;
        }
        let index = self.head_index(peer)?;
        let request = &mut self.requests[index];
        request.retries = request.retries.saturating_add(1);
        Some(request.retries)
    }
}

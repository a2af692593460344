//! SDP Host - connection life cycle and request routing
//!
//! `SdpHost` ties the protocol halves to the collaborators. Every method here
//! runs on the processor, one task at a time, so the record store, the
//! connection table and the request queue are never touched concurrently.
//!
//! ## Client flow
//!
//! 1. A request is queued. Without a connection to the peer, `connect` is
//!    issued and the connect timeout starts.
//! 2. The channel is configured in both directions. Once connected, the oldest
//!    request for the peer is sent.
//! 3. Each response either asks for a continuation (re-sent under the same
//!    transaction ID) or completes the request, which starts the next one.
//! 4. With nothing left to send, the idle timer runs and closes the channel.
//!
//! ## Server flow
//!
//! Inbound channels are accepted and configured; every PDU received on them is
//! answered by the [`SdpServer`](crate::sdp::SdpServer), which keeps the unsent
//! tail of a fragmented response on the connection.

mod task_processor;

use crate::constants::SDP_PSM;
use crate::l2cap::{ChannelId, DisconnectReason, L2capTransport, TransportEvent};
use crate::sdp::client::ResponseOutcome;
use crate::sdp::protocol::SdpRequest;
use crate::sdp::{ConnectionRole, ConnectionState, RequestKind, SdpError, TransactionId};
use crate::timer::{TimerId, TimerKind, TimerService};
use crate::{BluetoothAddress, SdpHost};

impl<T: L2capTransport, S: TimerService> SdpHost<T, S> {
    /// Queue a client request and push it towards the peer
    ///
    /// The request's callback reports the outcome, including connection
    /// failures; the returned ID only confirms it was queued.
    pub(crate) fn submit(
        &mut self,
        peer: BluetoothAddress,
        request: &SdpRequest,
        kind: RequestKind,
        context: usize,
    ) -> Result<TransactionId, SdpError> {
        if peer.is_zero() {
            return Err(SdpError::InvalidParameter);
        }
        let transaction_id = self.client.enqueue(peer, request, kind, context)?;
        match self.connections.find_by_peer(peer, ConnectionRole::Client) {
            None => self.open_client_connection(peer),
            Some(conn) if conn.is_connected() => {
                let channel = conn.channel();
                self.timer.cancel(TimerId::new(TimerKind::Idle, channel));
                self.send_next(peer, channel);
            }
            Some(conn) => debug!(
                "[SDP] Transaction {:#x} waits for channel {:#x} in {:?}",
                transaction_id,
                conn.channel(),
                conn.state()
            ),
        }
        Ok(transaction_id)
    }

    /// Connect to `peer` for its queued requests
    ///
    /// A refused connect fails the oldest request and tries again for the rest.
    fn open_client_connection(&mut self, peer: BluetoothAddress) {
        while self.client.has_requests(peer) {
            let channel = match self.transport.connect(peer, SDP_PSM) {
                Ok(channel) => channel,
                Err(e) => {
                    warn!("[SDP] Connect to {} refused: {}", peer, e);
                    self.client.fail_head(peer);
                    continue;
                }
            };
            match self.connections.create(peer, channel, ConnectionRole::Client) {
                Ok(conn) => {
                    conn.connecting();
                    self.timer.start(
                        TimerId::new(TimerKind::ConnectTimeout, channel),
                        self.options.connect_timeout_ms,
                    );
                    info!("[SDP] Connecting to {} on channel {:#x}", peer, channel);
                }
                Err(e) => {
                    error!("[SDP] No room for a connection to {}: {}", peer, e);
                    self.transport.disconnect(channel).ok();
                    self.client.fail_all(peer);
                }
            }
            return;
        }
    }

    /// Send the next waiting request to `peer`, or arm the idle timer
    fn send_next(&mut self, peer: BluetoothAddress, channel: ChannelId) {
        while let Some(pdu) = self.client.start_next(peer) {
            match self.transport.send(channel, &pdu) {
                Ok(()) => return,
                Err(e) => {
                    warn!("[SDP] Send on channel {:#x} failed: {}", channel, e);
                    self.client.fail_head(peer);
                }
            }
        }
        if !self.client.is_busy(peer) {
            self.timer.start(
                TimerId::new(TimerKind::Idle, channel),
                self.options.idle_timeout_ms,
            );
        }
    }

    fn cancel_timers(&mut self, channel: ChannelId) {
        self.timer
            .cancel(TimerId::new(TimerKind::ConnectTimeout, channel));
        self.timer.cancel(TimerId::new(TimerKind::Idle, channel));
    }

    /// Drop a connection; client requests to its peer fail
    fn abort(&mut self, channel: ChannelId) {
        self.cancel_timers(channel);
        if let Some(conn) = self.connections.remove(channel) {
            if conn.role() == ConnectionRole::Client {
                self.client.fail_all(conn.peer());
            }
        }
        self.transport.disconnect(channel).ok();
    }

    /// React to one transport event
    pub(crate) fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectIndication {
                peer,
                channel,
                identifier,
            } => self.on_connect_indication(peer, channel, identifier),
            TransportEvent::ConnectConfirm { channel, success } => {
                self.on_connect_confirm(channel, success);
            }
            TransportEvent::ConfigIndication {
                channel,
                identifier,
                mtu,
            } => {
                let Some(conn) = self.connections.find(channel) else {
                    warn!("[SDP] Configuration for unknown channel {:#x}", channel);
                    return;
                };
                let connected = conn.remote_configured(mtu);
                if let Err(e) = self.transport.respond_configure(channel, identifier) {
                    warn!("[SDP] Configure response failed: {}", e);
                    self.abort(channel);
                } else if connected {
                    self.on_connected(channel);
                }
            }
            TransportEvent::ConfigConfirm { channel, success } => {
                let Some(conn) = self.connections.find(channel) else {
                    warn!("[SDP] Configuration result for unknown channel {:#x}", channel);
                    return;
                };
                if !success {
                    warn!("[SDP] Peer rejected configuration of channel {:#x}", channel);
                    self.abort(channel);
                } else if conn.local_configured() {
                    self.on_connected(channel);
                }
            }
            TransportEvent::Data { channel, payload } => self.on_data(channel, &payload),
            TransportEvent::DisconnectIndication {
                channel,
                identifier,
            } => {
                self.transport.respond_disconnect(channel, identifier).ok();
                self.cancel_timers(channel);
                if let Some(conn) = self.connections.remove(channel) {
                    info!("[SDP] {} closed channel {:#x}", conn.peer(), channel);
                    if conn.role() == ConnectionRole::Client {
                        self.client.fail_all(conn.peer());
                    }
                }
            }
            TransportEvent::DisconnectConfirm { channel } => {
                self.cancel_timers(channel);
                let Some(conn) = self.connections.remove(channel) else {
                    return;
                };
                if conn.role() != ConnectionRole::Client {
                    return;
                }
                let peer = conn.peer();
                if !conn.expected_disconnect() {
                    self.client.fail_head(peer);
                }
                // requests queued while the channel was closing
                if self.client.has_requests(peer)
                    && self
                        .connections
                        .find_by_peer(peer, ConnectionRole::Client)
                        .is_none()
                {
                    self.open_client_connection(peer);
                }
            }
            TransportEvent::AbnormalClose { channel, reason } => {
                self.on_abnormal_close(channel, reason);
            }
        }
    }

    fn on_connect_indication(&mut self, peer: BluetoothAddress, channel: ChannelId, identifier: u8) {
        if let Err(e) = self.transport.accept(channel, identifier) {
            warn!("[SDP] Accept of channel {:#x} failed: {}", channel, e);
            return;
        }
        match self.connections.create(peer, channel, ConnectionRole::Server) {
            Ok(conn) => {
                conn.configuring();
                info!("[SDP] Incoming connection from {} on {:#x}", peer, channel);
            }
            Err(e) => {
                warn!("[SDP] Dropping connection from {}: {}", peer, e);
                self.transport.disconnect(channel).ok();
                return;
            }
        }
        self.timer.start(
            TimerId::new(TimerKind::ConnectTimeout, channel),
            self.options.connect_timeout_ms,
        );
        if let Err(e) = self.transport.configure(channel, self.options.mtu) {
            warn!("[SDP] Configure of channel {:#x} failed: {}", channel, e);
            self.abort(channel);
        }
    }

    fn on_connect_confirm(&mut self, channel: ChannelId, success: bool) {
        let Some(conn) = self.connections.find(channel) else {
            warn!("[SDP] Connect result for unknown channel {:#x}", channel);
            return;
        };
        if conn.state() != ConnectionState::ConnSetup {
            warn!("[SDP] Unexpected connect result in {:?}", conn.state());
            return;
        }
        if !success {
            warn!("[SDP] {} refused the connection", conn.peer());
            self.abort(channel);
            return;
        }
        conn.configuring();
        if let Err(e) = self.transport.configure(channel, self.options.mtu) {
            warn!("[SDP] Configure of channel {:#x} failed: {}", channel, e);
            self.abort(channel);
        }
    }

    fn on_connected(&mut self, channel: ChannelId) {
        self.timer
            .cancel(TimerId::new(TimerKind::ConnectTimeout, channel));
        let Some(conn) = self.connections.find(channel) else {
            return;
        };
        info!(
            "[SDP] Channel {:#x} to {} open, peer MTU {}",
            channel,
            conn.peer(),
            conn.mtu()
        );
        if conn.role() == ConnectionRole::Client {
            let peer = conn.peer();
            self.send_next(peer, channel);
        }
    }

    fn on_data(&mut self, channel: ChannelId, payload: &[u8]) {
        let Some(conn) = self.connections.find(channel) else {
            warn!("[SDP] Data on unknown channel {:#x}", channel);
            return;
        };
        if !conn.is_connected() {
            warn!("[SDP] Data on channel {:#x} in {:?}", channel, conn.state());
            return;
        }
        let peer = conn.peer();
        match conn.role() {
            ConnectionRole::Server => {
                let mtu = conn.mtu();
                match self
                    .server
                    .handle_request(conn.pending_fragment(), mtu, payload)
                {
                    Ok(response) => {
                        if let Err(e) = self.transport.send(channel, &response) {
                            warn!("[SDP] Response on channel {:#x} lost: {}", channel, e);
                        }
                    }
                    Err(e) => error!("[SDP] Cannot build response: {}", e),
                }
            }
            ConnectionRole::Client => match self.client.handle_response(peer, payload) {
                ResponseOutcome::Continue(pdu) => {
                    if let Err(e) = self.transport.send(channel, &pdu) {
                        warn!("[SDP] Continuation on channel {:#x} lost: {}", channel, e);
                        self.client.fail_head(peer);
                        self.send_next(peer, channel);
                    }
                }
                ResponseOutcome::Complete => self.send_next(peer, channel),
                ResponseOutcome::Ignored => {}
            },
        }
    }

    fn on_abnormal_close(&mut self, channel: ChannelId, reason: DisconnectReason) {
        self.cancel_timers(channel);
        let Some(conn) = self.connections.remove(channel) else {
            return;
        };
        warn!(
            "[SDP] Channel {:#x} to {} closed abnormally: {:?}",
            channel,
            conn.peer(),
            reason
        );
        if conn.role() != ConnectionRole::Client {
            return;
        }
        let peer = conn.peer();
        let retry = match reason {
            DisconnectReason::CommandDisallowed => self
                .client
                .head(peer)
                .is_some_and(|head| head.retries() < self.options.command_disallowed_retries),
            DisconnectReason::StateCollision => true,
            DisconnectReason::Other(_) => false,
        };
        if retry && self.client.requeue(peer).is_some() {
            info!("[SDP] Reconnecting to {}", peer);
            self.open_client_connection(peer);
        } else {
            self.client.fail_all(peer);
        }
    }

    /// React to an expired timer
    pub(crate) fn handle_timer(&mut self, id: TimerId) {
        let Some(conn) = self.connections.find(id.channel) else {
            debug!("[SDP] Stale timer {:?}", id);
            return;
        };
        match id.kind {
            TimerKind::ConnectTimeout => {
                if conn.is_connected() {
                    return;
                }
                warn!(
                    "[SDP] Channel {:#x} to {} not connected in time",
                    id.channel,
                    conn.peer()
                );
                self.abort(id.channel);
            }
            TimerKind::Idle => {
                let peer = conn.peer();
                if conn.role() != ConnectionRole::Client
                    || !conn.is_connected()
                    || self.client.has_requests(peer)
                {
                    return;
                }
                debug!("[SDP] Closing idle channel {:#x}", id.channel);
                conn.disconnecting(true);
                if self.transport.disconnect(id.channel).is_err() {
                    self.connections.remove(id.channel);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l2cap::mock::{MockTransport, Op};
    use crate::sdp::element::encode_variable_header;
    use crate::sdp::protocol::{
        ContinuationState, PduBuffer, SdpPduHeader, SdpResponse, build_pdu, write_search_response,
    };
    use crate::sdp::uuid::Uuid;
    use crate::sdp::{AttributeSelector, DataElementType, SdpPduId, ServiceRecordHandle};
    use crate::timer::mock::MockTimer;
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use heapless::Vec;

    const PEER: BluetoothAddress = BluetoothAddress::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]);

    type TestHost = SdpHost<MockTransport, MockTimer>;

    fn host() -> TestHost {
        SdpHost::new(MockTransport::new(), MockTimer::new())
    }

    fn search(uuid: u16) -> SdpRequest {
        SdpRequest::ServiceSearch {
            pattern: Vec::from_slice(&[Uuid::from(uuid)]).unwrap(),
            max_record_count: 16,
        }
    }

    fn ignore(_: &BluetoothAddress, _: &[ServiceRecordHandle], _: usize) {}

    fn connect(host: &mut TestHost, channel: ChannelId) {
        host.handle_transport_event(TransportEvent::ConnectConfirm {
            channel,
            success: true,
        });
        host.handle_transport_event(TransportEvent::ConfigIndication {
            channel,
            identifier: 1,
            mtu: Some(672),
        });
        host.handle_transport_event(TransportEvent::ConfigConfirm {
            channel,
            success: true,
        });
    }

    fn search_response(txid: u16, handles: &[u32], continuation: &[u8]) -> PduBuffer {
        let cont = ContinuationState::from_bytes(continuation).unwrap();
        let mut bytes: Vec<u8, 64> = Vec::new();
        for handle in handles {
            bytes.extend_from_slice(&handle.to_be_bytes()).unwrap();
        }
        build_pdu(SdpPduId::ServiceSearchResponse, txid, |out| {
            write_search_response(out, 2, &bytes, &cont)
        })
        .unwrap()
    }

    fn sent_txid(pdu: &[u8]) -> u16 {
        SdpPduHeader::decode(pdu).unwrap().0.transaction_id
    }

    fn data(channel: ChannelId, pdu: &[u8]) -> TransportEvent {
        TransportEvent::Data {
            channel,
            payload: Vec::from_slice(pdu).unwrap(),
        }
    }

    #[test]
    fn test_zero_peer_rejected() {
        let mut host = host();
        assert_eq!(
            host.submit(
                BluetoothAddress::ZERO,
                &search(0x1101),
                RequestKind::ServiceSearch(ignore),
                0
            ),
            Err(SdpError::InvalidParameter)
        );
        assert!(host.transport.ops.is_empty());
    }

    #[test]
    fn test_requests_share_one_connection_in_order() {
        let mut host = host();
        let first = host
            .submit(PEER, &search(0x1101), RequestKind::ServiceSearch(ignore), 0)
            .unwrap();
        let second = host
            .submit(PEER, &search(0x110A), RequestKind::ServiceSearch(ignore), 0)
            .unwrap();
        let third = host
            .submit(PEER, &search(0x110B), RequestKind::ServiceSearch(ignore), 0)
            .unwrap();

        assert_eq!(host.transport.ops.as_slice(), &[Op::Connect(PEER, 0x40)]);
        assert!(
            host.timer
                .is_running(TimerId::new(TimerKind::ConnectTimeout, 0x40))
        );

        connect(&mut host, 0x40);
        assert!(
            !host
                .timer
                .is_running(TimerId::new(TimerKind::ConnectTimeout, 0x40))
        );
        assert_eq!(sent_txid(host.transport.last_sent().unwrap()), first);

        host.handle_transport_event(data(0x40, &search_response(first, &[0x0001_0000, 0x0001_0001], &[])));
        assert_eq!(sent_txid(host.transport.last_sent().unwrap()), second);
        host.handle_transport_event(data(0x40, &search_response(second, &[0x0001_0000, 0x0001_0001], &[])));
        assert_eq!(sent_txid(host.transport.last_sent().unwrap()), third);
        host.handle_transport_event(data(0x40, &search_response(third, &[0x0001_0000, 0x0001_0001], &[])));

        let txids: Vec<u16, 4> = host.transport.sent().map(|(_, pdu)| sent_txid(pdu)).collect();
        assert_eq!(txids.as_slice(), &[first, second, third]);
        assert_eq!(
            host.transport
                .ops
                .iter()
                .filter(|op| matches!(op, Op::Connect(..)))
                .count(),
            1
        );
        assert!(host.timer.is_running(TimerId::new(TimerKind::Idle, 0x40)));
    }

    static FOUND: AtomicU32 = AtomicU32::new(0);
    static FOUND_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn on_found(_: &BluetoothAddress, handles: &[ServiceRecordHandle], context: usize) {
        FOUND.store(handles.iter().sum(), Ordering::SeqCst);
        FOUND_CALLS.fetch_add(context, Ordering::SeqCst);
    }

    #[test]
    fn test_continuation_then_idle_disconnect() {
        let mut host = host();
        let txid = host
            .submit(PEER, &search(0x1101), RequestKind::ServiceSearch(on_found), 1)
            .unwrap();
        connect(&mut host, 0x40);

        host.handle_transport_event(data(0x40, &search_response(txid, &[0x0001_0000], &[0x04])));
        let resend = host.transport.last_sent().unwrap();
        assert_eq!(sent_txid(resend), txid);
        assert_eq!(&resend[resend.len() - 2..], &[0x01, 0x04]);

        host.handle_transport_event(data(0x40, &search_response(txid, &[0x0001_0005], &[])));
        assert_eq!(FOUND.load(Ordering::SeqCst), 0x0002_0005);
        assert_eq!(FOUND_CALLS.load(Ordering::SeqCst), 1);

        let idle = TimerId::new(TimerKind::Idle, 0x40);
        assert!(host.timer.is_running(idle));
        host.handle_timer(idle);
        assert_eq!(host.transport.ops.last(), Some(&Op::Disconnect(0x40)));
        assert_eq!(
            host.connections.find(0x40).map(|c| c.state()),
            Some(ConnectionState::Disconnect)
        );

        host.handle_transport_event(TransportEvent::DisconnectConfirm { channel: 0x40 });
        assert!(host.connections.is_empty());
        assert_eq!(FOUND_CALLS.load(Ordering::SeqCst), 1);
    }

    static FAILED: AtomicUsize = AtomicUsize::new(0);

    fn on_failed(_: &BluetoothAddress, handles: &[ServiceRecordHandle], _: usize) {
        if handles.is_empty() {
            FAILED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_connect_timeout_fails_everything() {
        let mut host = host();
        host.submit(PEER, &search(0x1101), RequestKind::ServiceSearch(on_failed), 0)
            .unwrap();
        host.submit(PEER, &search(0x1102), RequestKind::ServiceSearch(on_failed), 0)
            .unwrap();
        host.handle_timer(TimerId::new(TimerKind::ConnectTimeout, 0x40));

        assert_eq!(FAILED.load(Ordering::SeqCst), 2);
        assert!(host.connections.is_empty());
        assert!(!host.client.has_requests(PEER));
        assert_eq!(host.transport.ops.last(), Some(&Op::Disconnect(0x40)));
    }

    static REFUSED: AtomicUsize = AtomicUsize::new(0);

    fn on_refused(_: &BluetoothAddress, handles: &[ServiceRecordHandle], _: usize) {
        if handles.is_empty() {
            REFUSED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_refused_connect_fails_request() {
        let mut host = host();
        host.transport.refuse_connect = true;
        assert!(
            host.submit(PEER, &search(0x1101), RequestKind::ServiceSearch(on_refused), 0)
                .is_ok()
        );
        assert_eq!(REFUSED.load(Ordering::SeqCst), 1);
        assert!(host.connections.is_empty());

        host.transport.refuse_connect = false;
        host.submit(PEER, &search(0x1101), RequestKind::ServiceSearch(on_refused), 0)
            .unwrap();
        host.handle_transport_event(TransportEvent::ConnectConfirm {
            channel: 0x40,
            success: false,
        });
        assert_eq!(REFUSED.load(Ordering::SeqCst), 2);
        assert!(host.connections.is_empty());
    }

    static DROPPED: AtomicUsize = AtomicUsize::new(0);

    fn on_dropped(_: &BluetoothAddress, handles: &[ServiceRecordHandle], _: usize) {
        if handles.is_empty() {
            DROPPED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_command_disallowed_retries_once() {
        let mut host = host();
        let txid = host
            .submit(PEER, &search(0x1101), RequestKind::ServiceSearch(on_dropped), 0)
            .unwrap();
        connect(&mut host, 0x40);
        host.handle_transport_event(TransportEvent::AbnormalClose {
            channel: 0x40,
            reason: DisconnectReason::CommandDisallowed,
        });

        assert_eq!(host.transport.ops.last(), Some(&Op::Connect(PEER, 0x41)));
        assert_eq!(DROPPED.load(Ordering::SeqCst), 0);
        assert_eq!(host.client.head(PEER).map(|r| r.retries()), Some(1));

        connect(&mut host, 0x41);
        assert_eq!(sent_txid(host.transport.last_sent().unwrap()), txid);

        host.handle_transport_event(TransportEvent::AbnormalClose {
            channel: 0x41,
            reason: DisconnectReason::CommandDisallowed,
        });
        assert_eq!(DROPPED.load(Ordering::SeqCst), 1);
        assert!(host.connections.is_empty());
    }

    static COLLIDED: AtomicUsize = AtomicUsize::new(0);

    fn on_collided(_: &BluetoothAddress, handles: &[ServiceRecordHandle], _: usize) {
        if handles.is_empty() {
            COLLIDED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_state_collision_always_reconnects() {
        let mut host = host();
        host.submit(PEER, &search(0x1101), RequestKind::ServiceSearch(on_collided), 0)
            .unwrap();
        for channel in 0x40..0x43 {
            host.handle_transport_event(TransportEvent::AbnormalClose {
                channel,
                reason: DisconnectReason::StateCollision,
            });
            assert_eq!(host.transport.ops.last(), Some(&Op::Connect(PEER, channel + 1)));
        }
        host.handle_transport_event(TransportEvent::AbnormalClose {
            channel: 0x43,
            reason: DisconnectReason::Other(0x08),
        });
        assert_eq!(COLLIDED.load(Ordering::SeqCst), 1);
        assert!(host.connections.is_empty());
    }

    #[test]
    fn test_remote_disconnect_fails_requests() {
        let mut host = host();
        host.submit(PEER, &search(0x1101), RequestKind::ServiceSearch(ignore), 0)
            .unwrap();
        connect(&mut host, 0x40);
        host.handle_transport_event(TransportEvent::DisconnectIndication {
            channel: 0x40,
            identifier: 9,
        });
        assert_eq!(host.transport.ops.last(), Some(&Op::RespondDisconnect(0x40)));
        assert!(host.connections.is_empty());
        assert!(!host.client.has_requests(PEER));
    }

    #[test]
    fn test_request_during_idle_close_opens_new_channel() {
        let mut host = host();
        let first = host
            .submit(PEER, &search(0x1101), RequestKind::ServiceSearch(ignore), 0)
            .unwrap();
        connect(&mut host, 0x40);
        host.handle_transport_event(data(0x40, &search_response(first, &[0x0001_0000, 0x0001_0001], &[])));
        host.handle_timer(TimerId::new(TimerKind::Idle, 0x40));

        host.submit(PEER, &search(0x1101), RequestKind::ServiceSearch(ignore), 0)
            .unwrap();
        assert_eq!(host.transport.ops.last(), Some(&Op::Connect(PEER, 0x41)));
        host.handle_transport_event(TransportEvent::DisconnectConfirm { channel: 0x40 });
        assert!(host.client.has_requests(PEER));
        assert_eq!(host.connections.len(), 1);
    }

    fn serve(host: &mut TestHost) -> ServiceRecordHandle {
        let store = host.server.store_mut();
        let handle = store.create_record().unwrap();
        store
            .add_service_class_id_list(handle, &[Uuid::from(0x1101)])
            .unwrap();
        store.add_service_name(handle, 0x0100, "Serial Port").unwrap();
        store.register(handle).unwrap();
        handle
    }

    #[test]
    fn test_server_answers_inbound_requests() {
        let mut host = host();
        let handle = serve(&mut host);
        host.handle_transport_event(TransportEvent::ConnectIndication {
            peer: PEER,
            channel: 0x50,
            identifier: 3,
        });
        assert_eq!(
            host.transport.ops.as_slice(),
            &[Op::Accept(0x50), Op::Configure(0x50, 672)]
        );
        host.handle_transport_event(TransportEvent::ConfigConfirm {
            channel: 0x50,
            success: true,
        });
        host.handle_transport_event(TransportEvent::ConfigIndication {
            channel: 0x50,
            identifier: 4,
            mtu: Some(48),
        });
        assert!(host.connections.find(0x50).unwrap().is_connected());
        assert!(host.transport.sent().next().is_none());

        let request = build_pdu(SdpPduId::ServiceSearchRequest, 7, |out| {
            search(0x1101).encode_parameters(out)?;
            ContinuationState::EMPTY.write(out)
        })
        .unwrap();
        host.handle_transport_event(data(0x50, &request));

        let (header, parameters) = SdpPduHeader::decode(host.transport.last_sent().unwrap()).unwrap();
        assert_eq!(header.transaction_id, 7);
        match SdpResponse::parse(header.pdu_id, parameters).unwrap() {
            SdpResponse::ServiceSearch { total, handles, continuation, .. } => {
                assert_eq!(total, 1);
                assert_eq!(handles, &handle.to_be_bytes());
                assert!(continuation.is_empty());
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_server_keeps_fragment_per_connection() {
        let mut host = host();
        let handle = serve(&mut host);
        host.handle_transport_event(TransportEvent::ConnectIndication {
            peer: PEER,
            channel: 0x50,
            identifier: 3,
        });
        host.handle_transport_event(TransportEvent::ConfigConfirm {
            channel: 0x50,
            success: true,
        });
        host.handle_transport_event(TransportEvent::ConfigIndication {
            channel: 0x50,
            identifier: 4,
            mtu: Some(48),
        });

        let attributes = |token: &ContinuationState| {
            build_pdu(SdpPduId::ServiceAttributeRequest, 8, |out| {
                SdpRequest::ServiceAttribute {
                    handle,
                    max_byte_count: 0xFFFF,
                    selector: AttributeSelector::all(),
                }
                .encode_parameters(out)?;
                token.write(out)
            })
            .unwrap()
        };
        host.handle_transport_event(data(0x50, &attributes(&ContinuationState::EMPTY)));

        let mut assembled: Vec<u8, 256> = Vec::new();
        for _ in 0..8 {
            let response = host.transport.last_sent().unwrap();
            let (header, parameters) = SdpPduHeader::decode(response).unwrap();
            let SdpResponse::AttributeList { list, continuation, .. } =
                SdpResponse::parse(header.pdu_id, parameters).unwrap()
            else {
                panic!("expected an attribute list");
            };
            assert!(response.len() <= 48);
            assembled.extend_from_slice(list).unwrap();
            if continuation.is_empty() {
                break;
            }
            let next = attributes(&continuation);
            host.handle_transport_event(data(0x50, &next));
        }
        assert!(host.connections.find(0x50).unwrap().pending_fragment().is_none());

        let record = host.server.store().record(handle).unwrap();
        let mut content: Vec<u8, 256> = Vec::new();
        for entry in record.attributes() {
            content.extend_from_slice(entry.encoded()).unwrap();
        }
        let mut expected: Vec<u8, 256> = Vec::new();
        encode_variable_header(DataElementType::Sequence, content.len(), &mut expected).unwrap();
        expected.extend_from_slice(&content).unwrap();
        assert_eq!(assembled, expected);
    }

    #[test]
    fn test_inbound_channel_must_configure_in_time() {
        let mut host = host();
        host.handle_transport_event(TransportEvent::ConnectIndication {
            peer: PEER,
            channel: 0x50,
            identifier: 3,
        });
        let timeout = TimerId::new(TimerKind::ConnectTimeout, 0x50);
        assert!(host.timer.is_running(timeout));
        host.handle_timer(timeout);
        assert!(host.connections.is_empty());
        assert_eq!(host.transport.ops.last(), Some(&Op::Disconnect(0x50)));
    }
}

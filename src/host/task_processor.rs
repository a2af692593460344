use crate::constants::MAX_SEARCH_RESULTS;
use crate::l2cap::L2capTransport;
use crate::sdp::protocol::SdpRequest;
use crate::sdp::{RequestKind, SdpError};
use crate::timer::TimerService;
use crate::{Completion, SdpHost, Task};

impl<T: L2capTransport, S: TimerService> SdpHost<T, S> {
    /// Execute one task; returns the completion for a waiting facade caller
    pub(crate) fn process_task(&mut self, task: Task) -> Option<Completion> {
        let result = match task {
            Task::CreateRecord => self
                .server
                .store_mut()
                .create_record()
                .map(Completion::Record),
            Task::DestroyRecord(handle) => {
                self.server.store_mut().destroy_record(handle).map(done)
            }
            Task::AddAttribute { handle, id, value } => self
                .server
                .store_mut()
                .add_encoded_attribute(handle, id, &value)
                .map(done),
            Task::Register(handle) => self.server.store_mut().register(handle).map(done),
            Task::Deregister(handle) => self.server.store_mut().deregister(handle).map(done),
            Task::ServiceSearch {
                peer,
                pattern,
                callback,
                context,
            } => {
                let request = SdpRequest::ServiceSearch {
                    pattern,
                    max_record_count: self.options.max_record_count.min(MAX_SEARCH_RESULTS as u16),
                };
                self.submit(peer, &request, RequestKind::ServiceSearch(callback), context)
                    .map(Completion::Queued)
            }
            Task::ServiceAttribute {
                peer,
                handle,
                selector,
                callback,
                context,
            } => {
                let request = SdpRequest::ServiceAttribute {
                    handle,
                    max_byte_count: self.options.max_attribute_byte_count,
                    selector,
                };
                self.submit(peer, &request, RequestKind::ServiceAttribute(callback), context)
                    .map(Completion::Queued)
            }
            Task::ServiceSearchAttribute {
                peer,
                pattern,
                selector,
                callback,
                context,
            } => {
                let request = SdpRequest::ServiceSearchAttribute {
                    pattern,
                    max_byte_count: self.options.max_attribute_byte_count,
                    selector,
                };
                self.submit(
                    peer,
                    &request,
                    RequestKind::ServiceSearchAttribute(callback),
                    context,
                )
                .map(Completion::Queued)
            }
            Task::Transport(event) => {
                self.handle_transport_event(event);
                return None;
            }
            Task::TimerExpired(id) => {
                self.handle_timer(id);
                return None;
            }
        };
        Some(result.unwrap_or_else(|e: SdpError| {
            debug!("[PROCESSOR] Task failed: {}", e);
            Completion::Error(e)
        }))
    }
}

fn done(_: ()) -> Completion {
    Completion::Done
}

#[cfg(test)]
mod tests {
    use crate::constants::MAX_SEARCH_RESULTS;
    use crate::l2cap::TransportEvent;
    use crate::l2cap::mock::{MockTransport, Op};
    use crate::sdp::SdpPduId;
    use crate::sdp::protocol::{
        ContinuationState, SdpPduHeader, SdpRequest, build_pdu, write_search_response,
    };
    use crate::sdp::element::DataElement;
    use crate::sdp::record::encode_element;
    use crate::sdp::uuid::Uuid;
    use crate::sdp::{AttributeSelector, RemoteService, SdpError, ServiceRecordHandle};
    use crate::timer::mock::MockTimer;
    use crate::{BluetoothAddress, Completion, SdpHost, SdpOptions, Task};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use heapless::Vec;

    fn ignore(_: &BluetoothAddress, _: &[ServiceRecordHandle], _: usize) {}

    fn ignore_service(_: &BluetoothAddress, _: Option<&RemoteService<'_>>, _: usize) {}

    #[test]
    fn test_record_tasks() {
        let mut host = SdpHost::new(MockTransport::new(), MockTimer::new());
        let Some(Completion::Record(handle)) = host.process_task(Task::CreateRecord) else {
            panic!("expected a record handle");
        };
        let value = encode_element(&DataElement::U8(0xFF)).unwrap();
        assert_eq!(
            host.process_task(Task::AddAttribute {
                handle,
                id: 0x0008,
                value: value.clone(),
            }),
            Some(Completion::Done)
        );
        assert_eq!(
            host.process_task(Task::AddAttribute {
                handle,
                id: 0x0008,
                value,
            }),
            Some(Completion::Error(SdpError::DuplicateAttribute))
        );
        assert_eq!(host.process_task(Task::Register(handle)), Some(Completion::Done));
        assert_eq!(
            host.process_task(Task::DestroyRecord(handle)),
            Some(Completion::Error(SdpError::StillRegistered))
        );
        assert_eq!(host.process_task(Task::Deregister(handle)), Some(Completion::Done));
        assert_eq!(host.process_task(Task::DestroyRecord(handle)), Some(Completion::Done));
        assert!(host.server().store().is_empty());
    }

    #[test]
    fn test_client_tasks_use_options() {
        let options = SdpOptions {
            max_attribute_byte_count: 0x0100,
            ..SdpOptions::default()
        };
        let mut host = SdpHost::with_options(MockTransport::new(), MockTimer::new(), options);
        let peer = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);
        let completion = host.process_task(Task::ServiceSearch {
            peer,
            pattern: Vec::from_slice(&[Uuid::from(0x1101)]).unwrap(),
            callback: ignore,
            context: 0,
        });
        assert!(matches!(completion, Some(Completion::Queued(1))));
        assert_eq!(host.transport().ops.as_slice(), &[Op::Connect(peer, 0x40)]);

        let completion = host.process_task(Task::ServiceAttribute {
            peer: BluetoothAddress::ZERO,
            handle: 0x0001_0000,
            selector: AttributeSelector::all(),
            callback: ignore_service,
            context: 0,
        });
        assert_eq!(completion, Some(Completion::Error(SdpError::InvalidParameter)));
    }

    static FOUND: AtomicUsize = AtomicUsize::new(0);

    fn count_found(_: &BluetoothAddress, handles: &[ServiceRecordHandle], _: usize) {
        FOUND.store(handles.len(), Ordering::SeqCst);
    }

    #[test]
    fn test_record_count_fits_the_result_list() {
        let options = SdpOptions {
            max_record_count: 20,
            ..SdpOptions::default()
        };
        let mut host = SdpHost::with_options(MockTransport::new(), MockTimer::new(), options);
        let peer = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);
        host.process_task(Task::ServiceSearch {
            peer,
            pattern: Vec::from_slice(&[Uuid::from(0x1101)]).unwrap(),
            callback: count_found,
            context: 0,
        });
        for event in [
            TransportEvent::ConnectConfirm {
                channel: 0x40,
                success: true,
            },
            TransportEvent::ConfigIndication {
                channel: 0x40,
                identifier: 1,
                mtu: None,
            },
            TransportEvent::ConfigConfirm {
                channel: 0x40,
                success: true,
            },
        ] {
            host.process_task(Task::Transport(event));
        }

        let sent = host.transport().last_sent().unwrap();
        let (header, parameters) = SdpPduHeader::decode(sent).unwrap();
        let (request, _) = SdpRequest::parse(header.pdu_id, parameters).unwrap();
        let SdpRequest::ServiceSearch { max_record_count, .. } = request else {
            panic!("expected a search request");
        };
        assert_eq!(usize::from(max_record_count), MAX_SEARCH_RESULTS);

        let mut handles: Vec<u8, { 4 * MAX_SEARCH_RESULTS }> = Vec::new();
        for handle in 0x0001_0000u32..0x0001_0000 + MAX_SEARCH_RESULTS as u32 {
            handles.extend_from_slice(&handle.to_be_bytes()).unwrap();
        }
        let total = max_record_count;
        let reply = build_pdu(SdpPduId::ServiceSearchResponse, header.transaction_id, |out| {
            write_search_response(out, total, &handles, &ContinuationState::EMPTY)
        })
        .unwrap();
        host.process_task(Task::Transport(TransportEvent::Data {
            channel: 0x40,
            payload: reply,
        }));
        assert_eq!(FOUND.load(Ordering::SeqCst), MAX_SEARCH_RESULTS);
    }

    #[test]
    fn test_events_complete_nothing() {
        let mut host = SdpHost::new(MockTransport::new(), MockTimer::new());
        assert_eq!(
            host.process_task(Task::TimerExpired(crate::timer::TimerId::new(
                crate::timer::TimerKind::Idle,
                0x40
            ))),
            None
        );
    }
}

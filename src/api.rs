//! `Sdpbird` API Functions
//!
//! This module provides the facade of [`SdpEngine`]. Every call is turned into a
//! task for the processor; calls that return a result wait for the task's
//! completion, so they behave like plain function calls that happen to await.
//! Calls are serialised: while one caller waits for its completion, others
//! wait for the API lock.
//!
//! Transport and timer glue post their events with
//! [`SdpEngine::transport_event`] and [`SdpEngine::timer_expired`], which only
//! queue the event.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sdpbird::sdp::{ServiceClassId, ProtocolDescriptor};
//!
//! let handle = ENGINE.create_record().await?;
//! ENGINE
//!     .add_service_class_id_list(handle, &[ServiceClassId::SerialPort.into()])
//!     .await?;
//! ENGINE.add_service_name(handle, 0x0100, "Serial Port").await?;
//! ENGINE.register(handle).await?;
//!
//! // Ask a peer which records carry the serial port class
//! ENGINE
//!     .service_search(peer, &[ServiceClassId::SerialPort.into()], on_handles, 0)
//!     .await?;
//! ```

use crate::constants::MAX_UUID_PATTERN;
use crate::l2cap::TransportEvent;
use crate::sdp::protocol::SearchPattern;
use crate::sdp::record::{
    AttributeValue, encode_additional_protocol_descriptor_lists, encode_element,
    encode_language_base_list, encode_profile_descriptor_list, encode_protocol_descriptor_list,
    encode_sequence, encode_uuid_list,
};
use crate::sdp::{
    AttributeId, AttributeSelector, DataElement, LanguageAttributeOffset, LanguageBaseAttributeId,
    ProfileDescriptor, ProtocolDescriptor, SdpError, ServiceAttributeCallback,
    ServiceRecordHandle, ServiceSearchAttributeCallback, ServiceSearchCallback, TransactionId,
    UniversalAttributeId, Uuid,
};
use crate::timer::TimerId;
use crate::{BluetoothAddress, Completion, NO_CALL, SdpEngine, Task};
use embassy_sync::blocking_mutex::raw::RawMutex;

impl<M: RawMutex> SdpEngine<M> {
    /// Post a task and wait for its completion
    ///
    /// A call dropped while waiting leaves its completion behind; completions
    /// carrying another call's number are discarded.
    async fn call(&self, task: Task) -> Completion {
        let mut last_call = self.api.lock().await;
        *last_call = last_call.wrapping_add(1).max(1);
        let call = *last_call;
        while let Ok((stale, _)) = self.completions.try_receive() {
            debug!("[API] Discarding completion of abandoned call {}", stale);
        }
        self.tasks.send((call, task)).await;
        loop {
            let (answered, completion) = self.completions.receive().await;
            if answered == call {
                return completion;
            }
            debug!("[API] Discarding completion of abandoned call {}", answered);
        }
    }

    async fn call_done(&self, task: Task) -> Result<(), SdpError> {
        match self.call(task).await {
            Completion::Done => Ok(()),
            Completion::Error(e) => Err(e),
            _ => Err(SdpError::InvalidParameter),
        }
    }

    async fn call_queued(&self, task: Task) -> Result<TransactionId, SdpError> {
        match self.call(task).await {
            Completion::Queued(transaction_id) => Ok(transaction_id),
            Completion::Error(e) => Err(e),
            _ => Err(SdpError::InvalidParameter),
        }
    }

    /// Create an empty, unregistered service record.
    ///
    /// The record already carries its `ServiceRecordHandle` attribute.
    ///
    /// # Errors
    ///
    /// Returns `TooManyRecords` if the store is full.
    pub async fn create_record(&self) -> Result<ServiceRecordHandle, SdpError> {
        match self.call(Task::CreateRecord).await {
            Completion::Record(handle) => Ok(handle),
            Completion::Error(e) => Err(e),
            _ => Err(SdpError::InvalidParameter),
        }
    }

    /// Destroy an unregistered record.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` or `StillRegistered`.
    pub async fn destroy_record(&self, handle: ServiceRecordHandle) -> Result<(), SdpError> {
        self.call_done(Task::DestroyRecord(handle)).await
    }

    /// Publish a record; its attributes are sorted by ID.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` or `AlreadyRegistered`.
    pub async fn register(&self, handle: ServiceRecordHandle) -> Result<(), SdpError> {
        self.call_done(Task::Register(handle)).await
    }

    /// Withdraw a record from remote searches, keeping its attributes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` or `NotRegistered`.
    pub async fn deregister(&self, handle: ServiceRecordHandle) -> Result<(), SdpError> {
        self.call_done(Task::Deregister(handle)).await
    }

    /// Add an attribute to an unregistered record.
    ///
    /// # Errors
    ///
    /// Returns `TooLarge` if the value does not fit, `UnknownRecord`,
    /// `StillRegistered` or `DuplicateAttribute`.
    pub async fn add_attribute(
        &self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        value: &DataElement<'_>,
    ) -> Result<(), SdpError> {
        let value = encode_element(value)?;
        self.add_value(handle, id, value).await
    }

    /// Add an attribute whose value is already one encoded data element.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for malformed bytes, plus the errors of
    /// [`SdpEngine::add_attribute`].
    pub async fn add_encoded_attribute(
        &self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        value: &[u8],
    ) -> Result<(), SdpError> {
        let value = AttributeValue::from_slice(value).map_err(|()| SdpError::TooLarge)?;
        self.add_value(handle, id, value).await
    }

    async fn add_value(
        &self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        value: AttributeValue,
    ) -> Result<(), SdpError> {
        self.call_done(Task::AddAttribute { handle, id, value }).await
    }

    async fn add_universal(
        &self,
        handle: ServiceRecordHandle,
        id: UniversalAttributeId,
        value: AttributeValue,
    ) -> Result<(), SdpError> {
        self.add_value(handle, id.to_u16(), value).await
    }

    /// Add the `ServiceClassIDList` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`]; an empty list is `InvalidParameter`.
    pub async fn add_service_class_id_list(
        &self,
        handle: ServiceRecordHandle,
        classes: &[Uuid],
    ) -> Result<(), SdpError> {
        let value = encode_uuid_list(classes)?;
        self.add_universal(handle, UniversalAttributeId::ServiceClassIdList, value)
            .await
    }

    /// Add the `ServiceRecordState` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_service_record_state(
        &self,
        handle: ServiceRecordHandle,
        state: u32,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::U32(state))?;
        self.add_universal(handle, UniversalAttributeId::ServiceRecordState, value)
            .await
    }

    /// Add the `ServiceID` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_service_id(&self, handle: ServiceRecordHandle, id: Uuid) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Uuid(id))?;
        self.add_universal(handle, UniversalAttributeId::ServiceId, value)
            .await
    }

    /// Add the `ProtocolDescriptorList` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`]; an empty list is `InvalidParameter`.
    pub async fn add_protocol_descriptor_list(
        &self,
        handle: ServiceRecordHandle,
        descriptors: &[ProtocolDescriptor],
    ) -> Result<(), SdpError> {
        let value = encode_protocol_descriptor_list(descriptors)?;
        self.add_universal(handle, UniversalAttributeId::ProtocolDescriptorList, value)
            .await
    }

    /// Add the `AdditionalProtocolDescriptorLists` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`]; empty lists are `InvalidParameter`.
    pub async fn add_additional_protocol_descriptor_lists(
        &self,
        handle: ServiceRecordHandle,
        lists: &[&[ProtocolDescriptor]],
    ) -> Result<(), SdpError> {
        let value = encode_additional_protocol_descriptor_lists(lists)?;
        self.add_universal(
            handle,
            UniversalAttributeId::AdditionalProtocolDescriptorLists,
            value,
        )
        .await
    }

    /// Add the `BrowseGroupList` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`]; an empty list is `InvalidParameter`.
    pub async fn add_browse_group_list(
        &self,
        handle: ServiceRecordHandle,
        groups: &[Uuid],
    ) -> Result<(), SdpError> {
        let value = encode_uuid_list(groups)?;
        self.add_universal(handle, UniversalAttributeId::BrowseGroupList, value)
            .await
    }

    /// Add the `LanguageBaseAttributeIDList` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`]; an empty list is `InvalidParameter`.
    pub async fn add_language_base_attribute_id_list(
        &self,
        handle: ServiceRecordHandle,
        entries: &[LanguageBaseAttributeId],
    ) -> Result<(), SdpError> {
        let value = encode_language_base_list(entries)?;
        self.add_universal(handle, UniversalAttributeId::LanguageBaseAttributeIdList, value)
            .await
    }

    /// Add the `ServiceInfoTimeToLive` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_service_info_time_to_live(
        &self,
        handle: ServiceRecordHandle,
        seconds: u32,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::U32(seconds))?;
        self.add_universal(handle, UniversalAttributeId::ServiceInfoTimeToLive, value)
            .await
    }

    /// Add the `ServiceAvailability` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_service_availability(
        &self,
        handle: ServiceRecordHandle,
        availability: u8,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::U8(availability))?;
        self.add_universal(handle, UniversalAttributeId::ServiceAvailability, value)
            .await
    }

    /// Add the `BluetoothProfileDescriptorList` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`]; an empty list is `InvalidParameter`.
    pub async fn add_bluetooth_profile_descriptor_list(
        &self,
        handle: ServiceRecordHandle,
        profiles: &[ProfileDescriptor],
    ) -> Result<(), SdpError> {
        let value = encode_profile_descriptor_list(profiles)?;
        self.add_universal(
            handle,
            UniversalAttributeId::BluetoothProfileDescriptorList,
            value,
        )
        .await
    }

    /// Add the `DocumentationURL` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_documentation_url(
        &self,
        handle: ServiceRecordHandle,
        url: &[u8],
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Url(url))?;
        self.add_universal(handle, UniversalAttributeId::DocumentationUrl, value)
            .await
    }

    /// Add the `ClientExecutableURL` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_client_executable_url(
        &self,
        handle: ServiceRecordHandle,
        url: &[u8],
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Url(url))?;
        self.add_universal(handle, UniversalAttributeId::ClientExecutableUrl, value)
            .await
    }

    /// Add the `IconURL` attribute.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_icon_url(&self, handle: ServiceRecordHandle, url: &[u8]) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Url(url))?;
        self.add_universal(handle, UniversalAttributeId::IconUrl, value)
            .await
    }

    async fn add_language_text(
        &self,
        handle: ServiceRecordHandle,
        base: u16,
        offset: LanguageAttributeOffset,
        text: &str,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Text(text.as_bytes()))?;
        self.add_value(handle, offset.id(base), value).await
    }

    /// Add the service name for the language at `base` (`0x0100` is primary).
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_service_name(
        &self,
        handle: ServiceRecordHandle,
        base: u16,
        name: &str,
    ) -> Result<(), SdpError> {
        self.add_language_text(handle, base, LanguageAttributeOffset::ServiceName, name)
            .await
    }

    /// Add the service description for the language at `base`.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_service_description(
        &self,
        handle: ServiceRecordHandle,
        base: u16,
        description: &str,
    ) -> Result<(), SdpError> {
        self.add_language_text(
            handle,
            base,
            LanguageAttributeOffset::ServiceDescription,
            description,
        )
        .await
    }

    /// Add the provider name for the language at `base`.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::add_attribute`].
    pub async fn add_provider_name(
        &self,
        handle: ServiceRecordHandle,
        base: u16,
        provider: &str,
    ) -> Result<(), SdpError> {
        self.add_language_text(handle, base, LanguageAttributeOffset::ProviderName, provider)
            .await
    }

    /// Add an attribute whose value is a sequence of already-encoded elements.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `content` is not a run of valid elements,
    /// plus the errors of [`SdpEngine::add_attribute`].
    pub async fn add_sequence_attribute(
        &self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        content: &[u8],
    ) -> Result<(), SdpError> {
        let value = encode_sequence(content)?;
        self.add_value(handle, id, value).await
    }

    /// Ask `peer` for the handles of records matching `pattern`.
    ///
    /// Returns once the request is queued; `callback` receives the handles (empty
    /// on failure) together with `context`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for the zero address or an empty pattern,
    /// `TooLarge` for more than `MAX_UUID_PATTERN` UUIDs, `QueueFull` when too
    /// many requests are outstanding.
    pub async fn service_search(
        &self,
        peer: BluetoothAddress,
        pattern: &[Uuid],
        callback: ServiceSearchCallback,
        context: usize,
    ) -> Result<TransactionId, SdpError> {
        let pattern = search_pattern(peer, pattern)?;
        self.call_queued(Task::ServiceSearch {
            peer,
            pattern,
            callback,
            context,
        })
        .await
    }

    /// Ask `peer` for the selected attributes of one record.
    ///
    /// `callback` receives the record (`None` on failure) together with `context`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for the zero address, a reserved handle or an
    /// empty selector,
    /// `QueueFull` when too many requests are outstanding.
    pub async fn service_attribute(
        &self,
        peer: BluetoothAddress,
        handle: ServiceRecordHandle,
        selector: &AttributeSelector,
        callback: ServiceAttributeCallback,
        context: usize,
    ) -> Result<TransactionId, SdpError> {
        if peer.is_zero() || handle < crate::constants::FIRST_RECORD_HANDLE || selector.is_empty() {
            return Err(SdpError::InvalidParameter);
        }
        self.call_queued(Task::ServiceAttribute {
            peer,
            handle,
            selector: selector.clone(),
            callback,
            context,
        })
        .await
    }

    /// Ask `peer` for the selected attributes of every record matching `pattern`.
    ///
    /// `callback` receives the records (empty on failure) together with `context`.
    ///
    /// # Errors
    ///
    /// See [`SdpEngine::service_search`]; an empty selector is `InvalidParameter`.
    pub async fn service_search_attribute(
        &self,
        peer: BluetoothAddress,
        pattern: &[Uuid],
        selector: &AttributeSelector,
        callback: ServiceSearchAttributeCallback,
        context: usize,
    ) -> Result<TransactionId, SdpError> {
        if selector.is_empty() {
            return Err(SdpError::InvalidParameter);
        }
        let pattern = search_pattern(peer, pattern)?;
        self.call_queued(Task::ServiceSearchAttribute {
            peer,
            pattern,
            selector: selector.clone(),
            callback,
            context,
        })
        .await
    }

    /// Hand a transport event to the engine.
    pub async fn transport_event(&self, event: TransportEvent) {
        self.tasks.send((NO_CALL, Task::Transport(event))).await;
    }

    /// Hand a transport event to the engine without waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` if the task queue is full.
    pub fn try_transport_event(&self, event: TransportEvent) -> Result<(), SdpError> {
        self.tasks
            .try_send((NO_CALL, Task::Transport(event)))
            .map_err(|_| SdpError::QueueFull)
    }

    /// Report an expired timer.
    pub async fn timer_expired(&self, id: TimerId) {
        self.tasks.send((NO_CALL, Task::TimerExpired(id))).await;
    }
}

fn search_pattern(peer: BluetoothAddress, pattern: &[Uuid]) -> Result<SearchPattern, SdpError> {
    if peer.is_zero() || pattern.is_empty() {
        return Err(SdpError::InvalidParameter);
    }
    if pattern.len() > MAX_UUID_PATTERN {
        return Err(SdpError::TooLarge);
    }
    SearchPattern::from_slice(pattern).map_err(|()| SdpError::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_validation() {
        let peer = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);
        let uuid = Uuid::from(0x1101);
        assert_eq!(search_pattern(peer, &[uuid]).map(|p| p.len()), Ok(1));
        assert_eq!(
            search_pattern(BluetoothAddress::ZERO, &[uuid]),
            Err(SdpError::InvalidParameter)
        );
        assert_eq!(search_pattern(peer, &[]), Err(SdpError::InvalidParameter));
        assert_eq!(
            search_pattern(peer, &[uuid; MAX_UUID_PATTERN + 1]),
            Err(SdpError::TooLarge)
        );
    }
}

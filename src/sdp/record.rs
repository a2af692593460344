//! SDP Service Record Management
//!
//! The record store owns every local service record. Each record keeps its
//! attributes pre-encoded as `UInt16 id` + value Data Element so that the server
//! can answer attribute requests by concatenating stored bytes.

use super::attribute::{LanguageAttributeOffset, UniversalAttributeId};
use super::cursor::ByteSink;
use super::element::{CodecError, DataElement, SequenceBuilder};
use super::uuid::Uuid;
use super::{AttributeId, SdpError, ServiceRecordHandle};
use crate::constants::{
    FIRST_RECORD_HANDLE, MAX_ATTRIBUTE_VALUE_SIZE, MAX_ATTRIBUTES_PER_RECORD, MAX_PROTOCOL_PARAMETERS,
    MAX_RECORD_SIZE, MAX_SEQUENCE_DEPTH, MAX_SERVICE_RECORDS,
};
use heapless::Vec;

/// One encoded attribute value
pub type AttributeValue = Vec<u8, MAX_ATTRIBUTE_VALUE_SIZE>;

/// Nesting allowed inside a stored attribute value
const MAX_VALUE_DEPTH: usize = MAX_SEQUENCE_DEPTH + 2;

/// Bytes taken by the `UInt16` attribute ID element in front of each value
const ATTRIBUTE_ID_LENGTH: usize = 3;

/// Parameter of a protocol descriptor (PSM, channel number, version...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolParameter {
    /// 8-bit parameter, e.g. an RFCOMM server channel
    U8(u8),
    /// 16-bit parameter, e.g. an L2CAP PSM or a protocol version
    U16(u16),
    /// 32-bit parameter
    U32(u32),
}

impl ProtocolParameter {
    /// The parameter as a data element
    #[must_use]
    pub const fn element(self) -> DataElement<'static> {
        match self {
            Self::U8(v) => DataElement::U8(v),
            Self::U16(v) => DataElement::U16(v),
            Self::U32(v) => DataElement::U32(v),
        }
    }

    /// Interpret a data element as a parameter
    #[must_use]
    pub const fn from_element(element: &DataElement<'_>) -> Option<Self> {
        match *element {
            DataElement::U8(v) => Some(Self::U8(v)),
            DataElement::U16(v) => Some(Self::U16(v)),
            DataElement::U32(v) => Some(Self::U32(v)),
            _ => None,
        }
    }

    /// Parameter value widened to `u32`
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::U8(v) => v as u32,
            Self::U16(v) => v as u32,
            Self::U32(v) => v,
        }
    }
}

/// One entry of a protocol descriptor list: a protocol UUID and its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    /// Protocol identifier
    pub protocol: Uuid,
    /// Protocol-specific parameters
    pub parameters: Vec<ProtocolParameter, MAX_PROTOCOL_PARAMETERS>,
}

impl ProtocolDescriptor {
    /// Create a descriptor
    ///
    /// # Errors
    ///
    /// Returns `TooLarge` for more than `MAX_PROTOCOL_PARAMETERS` parameters.
    pub fn new(protocol: Uuid, parameters: &[ProtocolParameter]) -> Result<Self, SdpError> {
        Ok(Self {
            protocol,
            parameters: Vec::from_slice(parameters).map_err(|()| SdpError::TooLarge)?,
        })
    }

    /// L2CAP descriptor carrying a PSM
    #[must_use]
    pub fn l2cap(psm: u16) -> Self {
        let mut parameters = Vec::new();
        parameters.push(ProtocolParameter::U16(psm)).ok();
        Self {
            protocol: Uuid::Uuid16(super::uuid::protocol::L2CAP),
            parameters,
        }
    }

    /// Descriptor with a single 16-bit version parameter (AVDTP, AVCTP...)
    #[must_use]
    pub fn versioned(protocol: u16, version: u16) -> Self {
        let mut parameters = Vec::new();
        parameters.push(ProtocolParameter::U16(version)).ok();
        Self {
            protocol: Uuid::Uuid16(protocol),
            parameters,
        }
    }

    /// The first parameter, when present
    #[must_use]
    pub fn first_parameter(&self) -> Option<ProtocolParameter> {
        self.parameters.first().copied()
    }

    fn encode<S: ByteSink>(&self, out: &mut S) -> Result<(), CodecError> {
        let mut seq: SequenceBuilder<{ 17 + MAX_PROTOCOL_PARAMETERS * 5 }> = SequenceBuilder::new();
        seq.push(&DataElement::Uuid(self.protocol))?;
        for parameter in &self.parameters {
            seq.push(&parameter.element())?;
        }
        seq.finish(out)
    }
}

/// Profile UUID and the supported profile version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileDescriptor {
    /// Profile identifier
    pub profile: Uuid,
    /// Version, major in the high byte
    pub version: u16,
}

/// One triplet of the language base attribute ID list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LanguageBaseAttributeId {
    /// ISO 639 language code
    pub language: u16,
    /// IANA character encoding (MIBenum)
    pub encoding: u16,
    /// Base attribute ID for this language's strings
    pub base: u16,
}

impl LanguageBaseAttributeId {
    /// English, UTF-8, primary language base
    pub const ENGLISH_UTF8: Self = Self {
        language: 0x656E,
        encoding: 0x006A,
        base: crate::constants::PRIMARY_LANGUAGE_BASE_ID,
    };
}

/// Encode a single data element as an attribute value
///
/// # Errors
///
/// Returns `TooLarge` if the encoding exceeds `MAX_ATTRIBUTE_VALUE_SIZE`.
pub fn encode_element(element: &DataElement<'_>) -> Result<AttributeValue, SdpError> {
    element.to_vec().map_err(|_| SdpError::TooLarge)
}

/// Encode a sequence of UUIDs (service class ID list, browse group list)
///
/// # Errors
///
/// Returns `InvalidParameter` for an empty list, `TooLarge` if the encoding does not fit.
pub fn encode_uuid_list(uuids: &[Uuid]) -> Result<AttributeValue, SdpError> {
    if uuids.is_empty() {
        return Err(SdpError::InvalidParameter);
    }
    let mut seq: SequenceBuilder<MAX_ATTRIBUTE_VALUE_SIZE> = SequenceBuilder::new();
    for uuid in uuids {
        seq.push(&DataElement::Uuid(*uuid)).map_err(|_| SdpError::TooLarge)?;
    }
    finish(&seq)
}

/// Encode a protocol descriptor list: a sequence of per-protocol sequences
///
/// # Errors
///
/// Returns `InvalidParameter` for an empty list, `TooLarge` if the encoding does not fit.
pub fn encode_protocol_descriptor_list(
    descriptors: &[ProtocolDescriptor],
) -> Result<AttributeValue, SdpError> {
    let seq = protocol_list(descriptors)?;
    finish(&seq)
}

/// Encode additional protocol descriptor lists: a sequence of protocol descriptor lists
///
/// # Errors
///
/// Returns `InvalidParameter` if any list is empty, `TooLarge` if the encoding does not fit.
pub fn encode_additional_protocol_descriptor_lists(
    lists: &[&[ProtocolDescriptor]],
) -> Result<AttributeValue, SdpError> {
    if lists.is_empty() {
        return Err(SdpError::InvalidParameter);
    }
    let mut outer: SequenceBuilder<MAX_ATTRIBUTE_VALUE_SIZE> = SequenceBuilder::new();
    for list in lists {
        let inner = protocol_list(list)?;
        outer
            .push(&inner.as_sequence())
            .map_err(|_| SdpError::TooLarge)?;
    }
    finish(&outer)
}

/// Encode the language base attribute ID list as flat `UInt16` triplets
///
/// # Errors
///
/// Returns `InvalidParameter` for an empty list, `TooLarge` if the encoding does not fit.
pub fn encode_language_base_list(
    entries: &[LanguageBaseAttributeId],
) -> Result<AttributeValue, SdpError> {
    if entries.is_empty() {
        return Err(SdpError::InvalidParameter);
    }
    let mut seq: SequenceBuilder<MAX_ATTRIBUTE_VALUE_SIZE> = SequenceBuilder::new();
    for entry in entries {
        seq.push(&DataElement::U16(entry.language))
            .and_then(|s| s.push(&DataElement::U16(entry.encoding)))
            .and_then(|s| s.push(&DataElement::U16(entry.base)))
            .map_err(|_| SdpError::TooLarge)?;
    }
    finish(&seq)
}

/// Encode the Bluetooth profile descriptor list
///
/// # Errors
///
/// Returns `InvalidParameter` for an empty list, `TooLarge` if the encoding does not fit.
pub fn encode_profile_descriptor_list(
    profiles: &[ProfileDescriptor],
) -> Result<AttributeValue, SdpError> {
    if profiles.is_empty() {
        return Err(SdpError::InvalidParameter);
    }
    let mut outer: SequenceBuilder<MAX_ATTRIBUTE_VALUE_SIZE> = SequenceBuilder::new();
    for profile in profiles {
        let mut inner: SequenceBuilder<24> = SequenceBuilder::new();
        inner
            .push(&DataElement::Uuid(profile.profile))
            .and_then(|s| s.push(&DataElement::U16(profile.version)))
            .map_err(|_| SdpError::TooLarge)?;
        outer
            .push(&inner.as_sequence())
            .map_err(|_| SdpError::TooLarge)?;
    }
    finish(&outer)
}

/// Wrap already-encoded elements in a sequence header
///
/// # Errors
///
/// Returns `InvalidParameter` if `content` is not a run of valid data elements,
/// `TooLarge` if the encoding does not fit.
pub fn encode_sequence(content: &[u8]) -> Result<AttributeValue, SdpError> {
    let element = DataElement::Sequence(content);
    element
        .validate(MAX_VALUE_DEPTH)
        .map_err(|_| SdpError::InvalidParameter)?;
    encode_element(&element)
}

fn protocol_list(
    descriptors: &[ProtocolDescriptor],
) -> Result<SequenceBuilder<MAX_ATTRIBUTE_VALUE_SIZE>, SdpError> {
    if descriptors.is_empty() {
        return Err(SdpError::InvalidParameter);
    }
    let mut seq: SequenceBuilder<MAX_ATTRIBUTE_VALUE_SIZE> = SequenceBuilder::new();
    for descriptor in descriptors {
        let mut entry: AttributeValue = Vec::new();
        descriptor
            .encode(&mut entry)
            .and_then(|()| seq.push_encoded(&entry).map(|_| ()))
            .map_err(|_| SdpError::TooLarge)?;
    }
    Ok(seq)
}

fn finish<const N: usize>(seq: &SequenceBuilder<N>) -> Result<AttributeValue, SdpError> {
    let mut out = AttributeValue::new();
    seq.finish(&mut out).map_err(|_| SdpError::TooLarge)?;
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttributeSlot {
    id: AttributeId,
    offset: usize,
    len: usize,
}

/// A stored attribute: its ID and pre-encoded bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeEntry<'a> {
    /// Attribute identifier
    pub id: AttributeId,
    encoded: &'a [u8],
}

impl<'a> AttributeEntry<'a> {
    /// `UInt16` ID element followed by the value element, as sent on the wire
    #[must_use]
    pub const fn encoded(&self) -> &'a [u8] {
        self.encoded
    }

    /// The value element's bytes
    #[must_use]
    pub fn value_bytes(&self) -> &'a [u8] {
        &self.encoded[ATTRIBUTE_ID_LENGTH..]
    }

    /// The decoded value
    ///
    /// # Errors
    ///
    /// Stored values are validated on insertion, so this only fails on corruption.
    pub fn value(&self) -> Result<DataElement<'a>, CodecError> {
        DataElement::decode(self.value_bytes()).map(|(element, _)| element)
    }
}

/// Service Record
///
/// Owned by the [`RecordStore`]. Attributes are kept in insertion order until the
/// record is registered, then sorted ascending by ID.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    handle: ServiceRecordHandle,
    slots: Vec<AttributeSlot, MAX_ATTRIBUTES_PER_RECORD>,
    data: Vec<u8, MAX_RECORD_SIZE>,
    registered: bool,
}

impl ServiceRecord {
    fn new(handle: ServiceRecordHandle) -> Self {
        Self {
            handle,
            slots: Vec::new(),
            data: Vec::new(),
            registered: false,
        }
    }

    /// Service record handle
    #[must_use]
    pub const fn handle(&self) -> ServiceRecordHandle {
        self.handle
    }

    /// Whether the record is visible to remote searches
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Number of attributes
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.slots.len()
    }

    /// Total size of all encoded attributes
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        self.data.len()
    }

    /// Iterate attributes in stored order
    pub fn attributes(&self) -> impl Iterator<Item = AttributeEntry<'_>> + '_ {
        self.slots.iter().map(|slot| AttributeEntry {
            id: slot.id,
            encoded: &self.data[slot.offset..slot.offset + slot.len],
        })
    }

    /// Look up one attribute
    #[must_use]
    pub fn attribute(&self, id: AttributeId) -> Option<AttributeEntry<'_>> {
        self.attributes().find(|entry| entry.id == id)
    }

    /// Whether any attribute value contains one of `patterns`
    #[must_use]
    pub fn contains_any_uuid(&self, patterns: &[Uuid]) -> bool {
        self.attributes().any(|entry| {
            entry
                .value()
                .is_ok_and(|value| value.contains_uuid(patterns, MAX_SEQUENCE_DEPTH))
        })
    }

    fn insert(&mut self, id: AttributeId, value: &[u8]) -> Result<(), SdpError> {
        if self.registered {
            return Err(SdpError::StillRegistered);
        }
        if self.slots.iter().any(|slot| slot.id == id) {
            return Err(SdpError::DuplicateAttribute);
        }
        let len = ATTRIBUTE_ID_LENGTH + value.len();
        if self.slots.is_full() || self.data.len() + len > MAX_RECORD_SIZE {
            return Err(SdpError::TooLarge);
        }
        let offset = self.data.len();
        DataElement::U16(id)
            .encode(&mut self.data)
            .and_then(|()| self.data.put(value))
            .map_err(|_| SdpError::TooLarge)?;
        self.slots
            .push(AttributeSlot { id, offset, len })
            .map_err(|_| SdpError::TooLarge)
    }
}

/// Local service record store
#[derive(Debug)]
pub struct RecordStore {
    records: Vec<ServiceRecord, MAX_SERVICE_RECORDS>,
    next_handle: ServiceRecordHandle,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    /// Create an empty store
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            next_handle: FIRST_RECORD_HANDLE,
        }
    }

    /// Number of records, registered or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record
    #[must_use]
    pub fn record(&self, handle: ServiceRecordHandle) -> Option<&ServiceRecord> {
        self.records.iter().find(|r| r.handle == handle)
    }

    /// Registered records in store order
    pub fn registered(&self) -> impl Iterator<Item = &ServiceRecord> + '_ {
        self.records.iter().filter(|r| r.registered)
    }

    fn record_mut(&mut self, handle: ServiceRecordHandle) -> Result<&mut ServiceRecord, SdpError> {
        self.records
            .iter_mut()
            .find(|r| r.handle == handle)
            .ok_or(SdpError::UnknownRecord)
    }

    fn allocate_handle(&mut self) -> ServiceRecordHandle {
        loop {
            let candidate = self.next_handle;
            self.next_handle = candidate.checked_add(1).unwrap_or(FIRST_RECORD_HANDLE);
            if self.record(candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Create an empty, unregistered record
    ///
    /// The new record already carries its `ServiceRecordHandle` attribute.
    ///
    /// # Errors
    ///
    /// Returns `TooManyRecords` when the store is full.
    pub fn create_record(&mut self) -> Result<ServiceRecordHandle, SdpError> {
        if self.records.is_full() {
            return Err(SdpError::TooManyRecords);
        }
        let handle = self.allocate_handle();
        let mut record = ServiceRecord::new(handle);
        let value = encode_element(&DataElement::U32(handle))?;
        record.insert(UniversalAttributeId::ServiceRecordHandle.to_u16(), &value)?;
        self.records
            .push(record)
            .map_err(|_| SdpError::TooManyRecords)?;
        debug!("[SDP] Created service record {:#x}", handle);
        Ok(handle)
    }

    /// Remove an unregistered record
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` if the handle does not exist and `StillRegistered`
    /// if the record must be deregistered first.
    pub fn destroy_record(&mut self, handle: ServiceRecordHandle) -> Result<(), SdpError> {
        let index = self
            .records
            .iter()
            .position(|r| r.handle == handle)
            .ok_or(SdpError::UnknownRecord)?;
        if self.records[index].registered {
            return Err(SdpError::StillRegistered);
        }
        self.records.remove(index);
        debug!("[SDP] Destroyed service record {:#x}", handle);
        Ok(())
    }

    /// Add an attribute given as a data element
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord`, `StillRegistered`, `DuplicateAttribute`, or `TooLarge`
    /// when the record's byte or attribute budget would be exceeded.
    pub fn add_attribute(
        &mut self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        value: &DataElement<'_>,
    ) -> Result<(), SdpError> {
        let encoded = encode_element(value)?;
        self.add_encoded_attribute(handle, id, &encoded)
    }

    /// Add an attribute whose value is already an encoded data element
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `value` is not exactly one well-formed element,
    /// plus the errors of [`RecordStore::add_attribute`].
    pub fn add_encoded_attribute(
        &mut self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        value: &[u8],
    ) -> Result<(), SdpError> {
        let (element, used) = DataElement::decode(value).map_err(|_| SdpError::InvalidParameter)?;
        if used != value.len() || element.validate(MAX_VALUE_DEPTH).is_err() {
            return Err(SdpError::InvalidParameter);
        }
        self.record_mut(handle)?.insert(id, value)
    }

    /// Publish a record; attributes are sorted by ID and frozen
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` or `AlreadyRegistered`.
    pub fn register(&mut self, handle: ServiceRecordHandle) -> Result<(), SdpError> {
        let record = self.record_mut(handle)?;
        if record.registered {
            return Err(SdpError::AlreadyRegistered);
        }
        record.slots.sort_unstable_by_key(|slot| slot.id);
        record.registered = true;
        info!("[SDP] Registered service record {:#x}", handle);
        Ok(())
    }

    /// Withdraw a record from remote searches, keeping its attributes
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` or `NotRegistered`.
    pub fn deregister(&mut self, handle: ServiceRecordHandle) -> Result<(), SdpError> {
        let record = self.record_mut(handle)?;
        if !record.registered {
            return Err(SdpError::NotRegistered);
        }
        record.registered = false;
        info!("[SDP] Deregistered service record {:#x}", handle);
        Ok(())
    }

    /// Add the `ServiceClassIDList` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`]; an empty list is `InvalidParameter`.
    pub fn add_service_class_id_list(
        &mut self,
        handle: ServiceRecordHandle,
        classes: &[Uuid],
    ) -> Result<(), SdpError> {
        let value = encode_uuid_list(classes)?;
        self.add_universal(handle, UniversalAttributeId::ServiceClassIdList, &value)
    }

    /// Add the `ServiceRecordState` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_service_record_state(
        &mut self,
        handle: ServiceRecordHandle,
        state: u32,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::U32(state))?;
        self.add_universal(handle, UniversalAttributeId::ServiceRecordState, &value)
    }

    /// Add the `ServiceID` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_service_id(&mut self, handle: ServiceRecordHandle, id: Uuid) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Uuid(id))?;
        self.add_universal(handle, UniversalAttributeId::ServiceId, &value)
    }

    /// Add the `ProtocolDescriptorList` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`]; an empty list is `InvalidParameter`.
    pub fn add_protocol_descriptor_list(
        &mut self,
        handle: ServiceRecordHandle,
        descriptors: &[ProtocolDescriptor],
    ) -> Result<(), SdpError> {
        let value = encode_protocol_descriptor_list(descriptors)?;
        self.add_universal(handle, UniversalAttributeId::ProtocolDescriptorList, &value)
    }

    /// Add the `AdditionalProtocolDescriptorLists` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`]; empty lists are `InvalidParameter`.
    pub fn add_additional_protocol_descriptor_lists(
        &mut self,
        handle: ServiceRecordHandle,
        lists: &[&[ProtocolDescriptor]],
    ) -> Result<(), SdpError> {
        let value = encode_additional_protocol_descriptor_lists(lists)?;
        self.add_universal(
            handle,
            UniversalAttributeId::AdditionalProtocolDescriptorLists,
            &value,
        )
    }

    /// Add the `BrowseGroupList` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`]; an empty list is `InvalidParameter`.
    pub fn add_browse_group_list(
        &mut self,
        handle: ServiceRecordHandle,
        groups: &[Uuid],
    ) -> Result<(), SdpError> {
        let value = encode_uuid_list(groups)?;
        self.add_universal(handle, UniversalAttributeId::BrowseGroupList, &value)
    }

    /// Add the `LanguageBaseAttributeIDList` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`]; an empty list is `InvalidParameter`.
    pub fn add_language_base_attribute_id_list(
        &mut self,
        handle: ServiceRecordHandle,
        entries: &[LanguageBaseAttributeId],
    ) -> Result<(), SdpError> {
        let value = encode_language_base_list(entries)?;
        self.add_universal(handle, UniversalAttributeId::LanguageBaseAttributeIdList, &value)
    }

    /// Add the `ServiceInfoTimeToLive` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_service_info_time_to_live(
        &mut self,
        handle: ServiceRecordHandle,
        seconds: u32,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::U32(seconds))?;
        self.add_universal(handle, UniversalAttributeId::ServiceInfoTimeToLive, &value)
    }

    /// Add the `ServiceAvailability` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_service_availability(
        &mut self,
        handle: ServiceRecordHandle,
        availability: u8,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::U8(availability))?;
        self.add_universal(handle, UniversalAttributeId::ServiceAvailability, &value)
    }

    /// Add the `BluetoothProfileDescriptorList` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`]; an empty list is `InvalidParameter`.
    pub fn add_bluetooth_profile_descriptor_list(
        &mut self,
        handle: ServiceRecordHandle,
        profiles: &[ProfileDescriptor],
    ) -> Result<(), SdpError> {
        let value = encode_profile_descriptor_list(profiles)?;
        self.add_universal(
            handle,
            UniversalAttributeId::BluetoothProfileDescriptorList,
            &value,
        )
    }

    /// Add the `DocumentationURL` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_documentation_url(
        &mut self,
        handle: ServiceRecordHandle,
        url: &[u8],
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Url(url))?;
        self.add_universal(handle, UniversalAttributeId::DocumentationUrl, &value)
    }

    /// Add the `ClientExecutableURL` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_client_executable_url(
        &mut self,
        handle: ServiceRecordHandle,
        url: &[u8],
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Url(url))?;
        self.add_universal(handle, UniversalAttributeId::ClientExecutableUrl, &value)
    }

    /// Add the `IconURL` attribute
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_icon_url(&mut self, handle: ServiceRecordHandle, url: &[u8]) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Url(url))?;
        self.add_universal(handle, UniversalAttributeId::IconUrl, &value)
    }

    /// Add a language-based text attribute (service name, description or provider name)
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_language_text(
        &mut self,
        handle: ServiceRecordHandle,
        base: u16,
        offset: LanguageAttributeOffset,
        text: &str,
    ) -> Result<(), SdpError> {
        let value = encode_element(&DataElement::Text(text.as_bytes()))?;
        self.add_encoded_attribute(handle, offset.id(base), &value)
    }

    /// Add the service name for the language at `base`
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_service_name(
        &mut self,
        handle: ServiceRecordHandle,
        base: u16,
        name: &str,
    ) -> Result<(), SdpError> {
        self.add_language_text(handle, base, LanguageAttributeOffset::ServiceName, name)
    }

    /// Add the service description for the language at `base`
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_service_description(
        &mut self,
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
    }

    /// Add the provider name for the language at `base`
    ///
    /// # Errors
    ///
    /// See [`RecordStore::add_attribute`].
    pub fn add_provider_name(
        &mut self,
        handle: ServiceRecordHandle,
        base: u16,
        provider: &str,
    ) -> Result<(), SdpError> {
        self.add_language_text(handle, base, LanguageAttributeOffset::ProviderName, provider)
    }

    /// Add an attribute whose value is a sequence of already-encoded elements
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `content` is not a run of valid elements,
    /// plus the errors of [`RecordStore::add_attribute`].
    pub fn add_sequence_attribute(
        &mut self,
        handle: ServiceRecordHandle,
        id: AttributeId,
        content: &[u8],
    ) -> Result<(), SdpError> {
        let value = encode_sequence(content)?;
        self.add_encoded_attribute(handle, id, &value)
    }

    fn add_universal(
        &mut self,
        handle: ServiceRecordHandle,
        id: UniversalAttributeId,
        value: &[u8],
    ) -> Result<(), SdpError> {
        self.add_encoded_attribute(handle, id.to_u16(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::uuid::{ServiceClassId, protocol};

    #[test]
    fn test_create_assigns_handles_above_reserved_range() {
        let mut store = RecordStore::new();
        let first = store.create_record().unwrap();
        let second = store.create_record().unwrap();
        assert!(first > 0xFFFF);
        assert_ne!(first, second);

        let record = store.record(first).unwrap();
        assert!(!record.is_registered());
        let handle_attr = record.attribute(0x0000).unwrap();
        assert_eq!(handle_attr.value().unwrap(), DataElement::U32(first));
    }

    #[test]
    fn test_store_capacity() {
        let mut store = RecordStore::new();
        for _ in 0..MAX_SERVICE_RECORDS {
            store.create_record().unwrap();
        }
        assert_eq!(store.create_record(), Err(SdpError::TooManyRecords));
    }

    #[test]
    fn test_destroy_rules() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        assert_eq!(store.destroy_record(0x0009_9999), Err(SdpError::UnknownRecord));

        store.register(handle).unwrap();
        assert_eq!(store.destroy_record(handle), Err(SdpError::StillRegistered));

        store.deregister(handle).unwrap();
        store.destroy_record(handle).unwrap();
        assert!(store.record(handle).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_register_state_errors() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        assert_eq!(store.deregister(handle), Err(SdpError::NotRegistered));
        store.register(handle).unwrap();
        assert_eq!(store.register(handle), Err(SdpError::AlreadyRegistered));
        assert_eq!(store.register(0x0001_FFFF), Err(SdpError::UnknownRecord));
    }

    #[test]
    fn test_duplicate_and_registered_attribute() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        store.add_attribute(handle, 0x0200, &DataElement::U8(1)).unwrap();
        assert_eq!(
            store.add_attribute(handle, 0x0200, &DataElement::U8(2)),
            Err(SdpError::DuplicateAttribute)
        );
        assert_eq!(
            store.add_attribute(handle, 0x0000, &DataElement::U8(2)),
            Err(SdpError::DuplicateAttribute)
        );

        store.register(handle).unwrap();
        assert_eq!(
            store.add_attribute(handle, 0x0201, &DataElement::U8(2)),
            Err(SdpError::StillRegistered)
        );
        assert_eq!(
            store.add_attribute(0x0005_0000, 0x0201, &DataElement::U8(2)),
            Err(SdpError::UnknownRecord)
        );
    }

    #[test]
    fn test_record_byte_budget() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        let chunk = [b'a'; 200];
        store.add_attribute(handle, 0x0100, &DataElement::Text(&chunk)).unwrap();
        store.add_attribute(handle, 0x0101, &DataElement::Text(&chunk)).unwrap();
        // 8 + 205 + 205 bytes used, another 205 would pass MAX_RECORD_SIZE
        assert_eq!(
            store.add_attribute(handle, 0x0102, &DataElement::Text(&chunk)),
            Err(SdpError::TooLarge)
        );
        let big = [b'b'; MAX_ATTRIBUTE_VALUE_SIZE];
        assert_eq!(
            store.add_attribute(handle, 0x0103, &DataElement::Text(&big)),
            Err(SdpError::TooLarge)
        );
    }

    #[test]
    fn test_register_sorts_attributes() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        store.add_attribute(handle, 0x0100, &DataElement::Text(b"name")).unwrap();
        store.add_service_availability(handle, 0xFF).unwrap();
        store
            .add_service_class_id_list(handle, &[ServiceClassId::AudioSink.to_uuid()])
            .unwrap();

        let before: Vec<u16, 8> = store.record(handle).unwrap().attributes().map(|a| a.id).collect();
        assert_eq!(&before[..], &[0x0000, 0x0100, 0x0008, 0x0001]);

        store.register(handle).unwrap();
        let after: Vec<u16, 8> = store.record(handle).unwrap().attributes().map(|a| a.id).collect();
        assert_eq!(&after[..], &[0x0000, 0x0001, 0x0008, 0x0100]);
        assert!(after.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_stored_entry_layout() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        store
            .add_service_class_id_list(handle, &[Uuid::Uuid16(0x1101)])
            .unwrap();
        let entry = store.record(handle).unwrap().attribute(0x0001).unwrap();
        assert_eq!(
            entry.encoded(),
            &[0x09, 0x00, 0x01, 0x35, 0x03, 0x19, 0x11, 0x01]
        );
        assert_eq!(entry.value_bytes(), &[0x35, 0x03, 0x19, 0x11, 0x01]);
    }

    #[test]
    fn test_protocol_descriptor_encoding() {
        let value = encode_protocol_descriptor_list(&[
            ProtocolDescriptor::l2cap(0x0019),
            ProtocolDescriptor::versioned(protocol::AVDTP, 0x0103),
        ])
        .unwrap();
        assert_eq!(
            &value[..],
            &[
                0x35, 0x10, 0x35, 0x06, 0x19, 0x01, 0x00, 0x09, 0x00, 0x19, 0x35, 0x06, 0x19,
                0x00, 0x19, 0x09, 0x01, 0x03
            ]
        );
    }

    #[test]
    fn test_profile_and_language_encoding() {
        let profiles = encode_profile_descriptor_list(&[ProfileDescriptor {
            profile: Uuid::Uuid16(0x110D),
            version: 0x0103,
        }])
        .unwrap();
        assert_eq!(
            &profiles[..],
            &[0x35, 0x08, 0x35, 0x06, 0x19, 0x11, 0x0D, 0x09, 0x01, 0x03]
        );

        let languages = encode_language_base_list(&[LanguageBaseAttributeId::ENGLISH_UTF8]).unwrap();
        assert_eq!(
            &languages[..],
            &[0x35, 0x09, 0x09, 0x65, 0x6E, 0x09, 0x00, 0x6A, 0x09, 0x01, 0x00]
        );
    }

    #[test]
    fn test_additional_protocol_lists() {
        let browsing = [
            ProtocolDescriptor::l2cap(0x001B),
            ProtocolDescriptor::versioned(protocol::AVCTP, 0x0104),
        ];
        let value = encode_additional_protocol_descriptor_lists(&[&browsing]).unwrap();
        assert_eq!(value[0], 0x35);
        let (outer, used) = DataElement::decode(&value).unwrap();
        assert_eq!(used, value.len());
        let list = outer.children().unwrap().next().unwrap().unwrap();
        assert_eq!(list.children().unwrap().count(), 2);
        assert_eq!(
            encode_additional_protocol_descriptor_lists(&[]),
            Err(SdpError::InvalidParameter)
        );
    }

    #[test]
    fn test_sequence_attribute_validates_content() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        store
            .add_sequence_attribute(handle, 0x0311, &[0x09, 0x00, 0x01])
            .unwrap();
        assert_eq!(
            store.add_sequence_attribute(handle, 0x0312, &[0x09, 0x00]),
            Err(SdpError::InvalidParameter)
        );
        let entry = store.record(handle).unwrap().attribute(0x0311).unwrap();
        assert_eq!(entry.value_bytes(), &[0x35, 0x03, 0x09, 0x00, 0x01]);
    }

    #[test]
    fn test_encoded_attribute_must_be_one_element() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        assert_eq!(
            store.add_encoded_attribute(handle, 0x0200, &[0x08, 0x01, 0x08]),
            Err(SdpError::InvalidParameter)
        );
        assert_eq!(
            store.add_encoded_attribute(handle, 0x0200, &[0x25, 0x05, b'a']),
            Err(SdpError::InvalidParameter)
        );
    }

    #[test]
    fn test_language_text_helpers() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        store.add_service_name(handle, 0x0100, "Audio").unwrap();
        store.add_provider_name(handle, 0x0100, "Bird").unwrap();
        let record = store.record(handle).unwrap();
        assert_eq!(
            record.attribute(0x0100).unwrap().value().unwrap().as_str(),
            Some("Audio")
        );
        assert_eq!(
            record.attribute(0x0102).unwrap().value().unwrap().as_str(),
            Some("Bird")
        );
    }

    #[test]
    fn test_uuid_search_over_attributes() {
        let mut store = RecordStore::new();
        let handle = store.create_record().unwrap();
        store
            .add_protocol_descriptor_list(handle, &[ProtocolDescriptor::l2cap(0x0019)])
            .unwrap();
        let record = store.record(handle).unwrap();
        assert!(record.contains_any_uuid(&[Uuid::Uuid128(
            0x0000_0100_0000_1000_8000_0080_5F9B_34FB
        )]));
        assert!(!record.contains_any_uuid(&[Uuid::Uuid16(0x0003)]));
    }
}

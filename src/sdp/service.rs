//! Remote service view
//!
//! [`RemoteService`] borrows one record's attribute list as returned by a
//! remote SDP server and decodes the universal attributes on demand.

use super::attribute::{LanguageAttributeOffset, UniversalAttributeId};
use super::element::{CodecError, Children, DataElement};
use super::record::{LanguageBaseAttributeId, ProfileDescriptor, ProtocolDescriptor, ProtocolParameter};
use super::uuid::Uuid;
use super::{AttributeId, ServiceRecordHandle};
use crate::constants::{
    MAX_ADDITIONAL_PROTOCOL_LISTS, MAX_LANGUAGE_BASES, MAX_PROFILE_DESCRIPTORS,
    MAX_PROTOCOL_DESCRIPTORS, MAX_SEQUENCE_DEPTH, MAX_SERVICE_RESULTS, PRIMARY_LANGUAGE_BASE_ID,
};
use heapless::Vec;

/// Protocol stack of a service
pub type ProtocolStack = Vec<ProtocolDescriptor, MAX_PROTOCOL_DESCRIPTORS>;

/// Nesting allowed below an attribute value
const MAX_VALUE_DEPTH: usize = MAX_SEQUENCE_DEPTH + 2;

/// A service record received from a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteService<'a> {
    content: &'a [u8],
}

impl<'a> RemoteService<'a> {
    /// Parse one attribute list: a sequence of `UInt16` ID and value pairs
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` for trailing bytes, `UnexpectedKind` if the list
    /// is not a sequence of ID/value pairs, and any nested decoding error.
    pub fn parse(list: &'a [u8]) -> Result<Self, CodecError> {
        let (element, used) = DataElement::decode(list)?;
        if used != list.len() {
            return Err(CodecError::MalformedLength);
        }
        Self::from_element(&element)
    }

    /// View an already decoded attribute list element
    ///
    /// # Errors
    ///
    /// See [`RemoteService::parse`].
    pub fn from_element(element: &DataElement<'a>) -> Result<Self, CodecError> {
        let DataElement::Sequence(content) = *element else {
            return Err(CodecError::UnexpectedKind);
        };
        let mut children = Children::new(content);
        while let Some(id) = children.next() {
            id?.expect_u16()?;
            let value = children.next().ok_or(CodecError::MalformedLength)??;
            value.validate(MAX_VALUE_DEPTH)?;
        }
        Ok(Self { content })
    }

    /// Iterate `(id, value)` pairs in received order
    pub fn attributes(self) -> impl Iterator<Item = (AttributeId, DataElement<'a>)> + 'a {
        let mut children = Children::new(self.content);
        core::iter::from_fn(move || {
            let id = children.next()?.ok()?.expect_u16().ok()?;
            let value = children.next()?.ok()?;
            Some((id, value))
        })
    }

    /// Look up one attribute value
    #[must_use]
    pub fn attribute(&self, id: AttributeId) -> Option<DataElement<'a>> {
        self.attributes()
            .find(|(attribute, _)| *attribute == id)
            .map(|(_, value)| value)
    }

    fn universal(&self, id: UniversalAttributeId) -> Option<DataElement<'a>> {
        self.attribute(id.to_u16())
    }

    fn uuids(self, id: UniversalAttributeId) -> impl Iterator<Item = Uuid> + 'a {
        self.universal(id)
            .and_then(|value| value.expect_sequence().ok())
            .into_iter()
            .flatten()
            .filter_map(|child| child.ok().and_then(|c| c.as_uuid()))
    }

    /// `ServiceRecordHandle`
    #[must_use]
    pub fn handle(&self) -> Option<ServiceRecordHandle> {
        self.universal(UniversalAttributeId::ServiceRecordHandle)
            .and_then(|value| value.expect_u32().ok())
    }

    /// `ServiceClassIDList`, most specific class first
    pub fn service_class_ids(self) -> impl Iterator<Item = Uuid> + 'a {
        self.uuids(UniversalAttributeId::ServiceClassIdList)
    }

    /// Whether the service class list names `class`
    #[must_use]
    pub fn has_service_class(&self, class: impl Into<Uuid>) -> bool {
        let class = class.into();
        self.service_class_ids().any(|uuid| uuid == class)
    }

    /// `ServiceRecordState`
    #[must_use]
    pub fn record_state(&self) -> Option<u32> {
        self.universal(UniversalAttributeId::ServiceRecordState)
            .and_then(|value| value.expect_u32().ok())
    }

    /// `ServiceID`
    #[must_use]
    pub fn service_id(&self) -> Option<Uuid> {
        self.universal(UniversalAttributeId::ServiceId)
            .and_then(|value| value.as_uuid())
    }

    /// `ProtocolDescriptorList`
    ///
    /// When the attribute is an alternative, the first alternative is used.
    #[must_use]
    pub fn protocol_descriptors(&self) -> ProtocolStack {
        let Some(value) = self.universal(UniversalAttributeId::ProtocolDescriptorList) else {
            return ProtocolStack::new();
        };
        let value = match value {
            DataElement::Alternative(_) => value
                .children()
                .ok()
                .and_then(|mut alternatives| alternatives.next())
                .and_then(Result::ok)
                .unwrap_or(DataElement::Nil),
            other => other,
        };
        parse_protocol_stack(&value)
    }

    /// `AdditionalProtocolDescriptorLists`
    #[must_use]
    pub fn additional_protocol_descriptors(&self) -> Vec<ProtocolStack, MAX_ADDITIONAL_PROTOCOL_LISTS> {
        let mut lists = Vec::new();
        let stacks = self
            .universal(UniversalAttributeId::AdditionalProtocolDescriptorLists)
            .and_then(|value| value.expect_sequence().ok())
            .into_iter()
            .flatten()
            .map_while(Result::ok);
        for stack in stacks {
            if lists.push(parse_protocol_stack(&stack)).is_err() {
                break;
            }
        }
        lists
    }

    /// L2CAP PSM of the primary protocol stack
    #[must_use]
    pub fn l2cap_psm(&self) -> Option<u16> {
        self.protocol_descriptors()
            .iter()
            .find(|descriptor| descriptor.protocol == Uuid::Uuid16(super::uuid::protocol::L2CAP))
            .and_then(ProtocolDescriptor::first_parameter)
            .and_then(|parameter| u16::try_from(parameter.value()).ok())
    }

    /// RFCOMM server channel of the primary protocol stack
    #[must_use]
    pub fn rfcomm_channel(&self) -> Option<u8> {
        self.protocol_descriptors()
            .iter()
            .find(|descriptor| descriptor.protocol == Uuid::Uuid16(super::uuid::protocol::RFCOMM))
            .and_then(ProtocolDescriptor::first_parameter)
            .and_then(|parameter| u8::try_from(parameter.value()).ok())
    }

    /// `BrowseGroupList`
    pub fn browse_groups(self) -> impl Iterator<Item = Uuid> + 'a {
        self.uuids(UniversalAttributeId::BrowseGroupList)
    }

    /// `LanguageBaseAttributeIDList`
    #[must_use]
    pub fn language_base_ids(&self) -> Vec<LanguageBaseAttributeId, MAX_LANGUAGE_BASES> {
        let mut bases = Vec::new();
        let Some(mut values) = self
            .universal(UniversalAttributeId::LanguageBaseAttributeIdList)
            .and_then(|value| value.expect_sequence().ok())
        else {
            return bases;
        };
        loop {
            let mut next = || values.next().and_then(Result::ok).and_then(|v| v.expect_u16().ok());
            let (Some(language), Some(encoding), Some(base)) = (next(), next(), next()) else {
                break;
            };
            let entry = LanguageBaseAttributeId {
                language,
                encoding,
                base,
            };
            if bases.push(entry).is_err() {
                break;
            }
        }
        bases
    }

    /// `ServiceInfoTimeToLive` in seconds
    #[must_use]
    pub fn time_to_live(&self) -> Option<u32> {
        self.universal(UniversalAttributeId::ServiceInfoTimeToLive)
            .and_then(|value| value.expect_u32().ok())
    }

    /// `ServiceAvailability`, 0xFF meaning fully available
    #[must_use]
    pub fn availability(&self) -> Option<u8> {
        match self.universal(UniversalAttributeId::ServiceAvailability)? {
            DataElement::U8(value) => Some(value),
            _ => None,
        }
    }

    /// `BluetoothProfileDescriptorList`
    #[must_use]
    pub fn profile_descriptors(&self) -> Vec<ProfileDescriptor, MAX_PROFILE_DESCRIPTORS> {
        let mut profiles = Vec::new();
        let entries = self
            .universal(UniversalAttributeId::BluetoothProfileDescriptorList)
            .and_then(|value| value.expect_sequence().ok())
            .into_iter()
            .flatten()
            .map_while(Result::ok);
        for entry in entries {
            let Ok(mut fields) = entry.expect_sequence() else {
                continue;
            };
            let profile = fields.next().and_then(Result::ok).and_then(|f| f.as_uuid());
            let version = fields.next().and_then(Result::ok).and_then(|f| f.expect_u16().ok());
            if let (Some(profile), Some(version)) = (profile, version) {
                if profiles.push(ProfileDescriptor { profile, version }).is_err() {
                    break;
                }
            }
        }
        profiles
    }

    /// Version of `profile` from the profile descriptor list
    #[must_use]
    pub fn profile_version(&self, profile: impl Into<Uuid>) -> Option<u16> {
        let profile = profile.into();
        self.profile_descriptors()
            .iter()
            .find(|descriptor| descriptor.profile == profile)
            .map(|descriptor| descriptor.version)
    }

    fn url(&self, id: UniversalAttributeId) -> Option<&'a [u8]> {
        match self.universal(id)? {
            DataElement::Url(url) => Some(url),
            _ => None,
        }
    }

    /// `DocumentationURL`
    #[must_use]
    pub fn documentation_url(&self) -> Option<&'a [u8]> {
        self.url(UniversalAttributeId::DocumentationUrl)
    }

    /// `ClientExecutableURL`
    #[must_use]
    pub fn client_executable_url(&self) -> Option<&'a [u8]> {
        self.url(UniversalAttributeId::ClientExecutableUrl)
    }

    /// `IconURL`
    #[must_use]
    pub fn icon_url(&self) -> Option<&'a [u8]> {
        self.url(UniversalAttributeId::IconUrl)
    }

    /// Base ID of the primary language, from the language base list when present
    fn primary_language_base(&self) -> u16 {
        self.language_base_ids()
            .first()
            .map_or(PRIMARY_LANGUAGE_BASE_ID, |entry| entry.base)
    }

    fn text(&self, offset: LanguageAttributeOffset) -> Option<&'a str> {
        self.attribute(offset.id(self.primary_language_base()))?
            .as_str()
    }

    /// Service name in the primary language
    #[must_use]
    pub fn service_name(&self) -> Option<&'a str> {
        self.text(LanguageAttributeOffset::ServiceName)
    }

    /// Service description in the primary language
    #[must_use]
    pub fn service_description(&self) -> Option<&'a str> {
        self.text(LanguageAttributeOffset::ServiceDescription)
    }

    /// Provider name in the primary language
    #[must_use]
    pub fn provider_name(&self) -> Option<&'a str> {
        self.text(LanguageAttributeOffset::ProviderName)
    }
}

fn parse_protocol_stack(value: &DataElement<'_>) -> ProtocolStack {
    let mut stack = ProtocolStack::new();
    let layers = value
        .expect_sequence()
        .into_iter()
        .flatten()
        .map_while(Result::ok);
    for layer in layers {
        let Ok(mut fields) = layer.expect_sequence() else {
            continue;
        };
        let Some(protocol) = fields.next().and_then(Result::ok).and_then(|f| f.as_uuid()) else {
            continue;
        };
        let mut descriptor = ProtocolDescriptor {
            protocol,
            parameters: Vec::new(),
        };
        for field in fields.map_while(Result::ok) {
            if let Some(parameter) = ProtocolParameter::from_element(&field) {
                if descriptor.parameters.push(parameter).is_err() {
                    break;
                }
            }
        }
        if stack.push(descriptor).is_err() {
            break;
        }
    }
    stack
}

/// Split a search-attribute response into per-record views
///
/// # Errors
///
/// Returns a decoding error if the outer list or any record list is malformed.
/// Records beyond `MAX_SERVICE_RESULTS` are dropped.
pub fn parse_service_list(list: &[u8]) -> Result<Vec<RemoteService<'_>, MAX_SERVICE_RESULTS>, CodecError> {
    let (outer, used) = DataElement::decode(list)?;
    if used != list.len() {
        return Err(CodecError::MalformedLength);
    }
    let mut services = Vec::new();
    for record in outer.expect_sequence()? {
        let service = RemoteService::from_element(&record?)?;
        if services.push(service).is_err() {
            warn!("[CLIENT] Dropping services beyond {}", MAX_SERVICE_RESULTS);
            break;
        }
    }
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::attribute::AttributeSelector;
    use crate::sdp::record::RecordStore;
    use crate::sdp::uuid::{ServiceClassId, protocol};

    /// Encode the attribute list of a local record as a server would send it
    fn attribute_list(store: &RecordStore, handle: ServiceRecordHandle) -> Vec<u8, 512> {
        let record = store.record(handle).unwrap();
        let selector = AttributeSelector::all();
        let mut content: Vec<u8, 512> = Vec::new();
        for entry in record.attributes().filter(|e| selector.matches(e.id)) {
            content.extend_from_slice(entry.encoded()).unwrap();
        }
        DataElement::Sequence(&content).to_vec().unwrap()
    }

    fn audio_sink(store: &mut RecordStore) -> ServiceRecordHandle {
        let handle = store.create_record().unwrap();
        store
            .add_service_class_id_list(handle, &[ServiceClassId::AudioSink.to_uuid()])
            .unwrap();
        store
            .add_protocol_descriptor_list(
                handle,
                &[
                    ProtocolDescriptor::l2cap(0x0019),
                    ProtocolDescriptor::versioned(protocol::AVDTP, 0x0103),
                ],
            )
            .unwrap();
        store
            .add_browse_group_list(handle, &[ServiceClassId::PublicBrowseRoot.to_uuid()])
            .unwrap();
        store
            .add_language_base_attribute_id_list(handle, &[LanguageBaseAttributeId::ENGLISH_UTF8])
            .unwrap();
        store
            .add_bluetooth_profile_descriptor_list(
                handle,
                &[ProfileDescriptor {
                    profile: ServiceClassId::AdvancedAudioDistribution.to_uuid(),
                    version: 0x0103,
                }],
            )
            .unwrap();
        store.add_service_name(handle, 0x0100, "Speaker").unwrap();
        store.add_provider_name(handle, 0x0100, "Sdpbird").unwrap();
        store.add_service_availability(handle, 0xFF).unwrap();
        store.register(handle).unwrap();
        handle
    }

    #[test]
    fn test_typed_accessors() {
        let mut store = RecordStore::new();
        let handle = audio_sink(&mut store);
        let list = attribute_list(&store, handle);
        let service = RemoteService::parse(&list).unwrap();

        assert_eq!(service.handle(), Some(handle));
        assert!(service.has_service_class(ServiceClassId::AudioSink));
        assert!(!service.has_service_class(ServiceClassId::AudioSource));
        assert_eq!(service.l2cap_psm(), Some(0x0019));
        assert_eq!(service.rfcomm_channel(), None);

        let stack = service.protocol_descriptors();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[1].protocol, Uuid::Uuid16(protocol::AVDTP));
        assert_eq!(stack[1].first_parameter(), Some(ProtocolParameter::U16(0x0103)));

        assert_eq!(
            service.browse_groups().next(),
            Some(ServiceClassId::PublicBrowseRoot.to_uuid())
        );
        assert_eq!(&service.language_base_ids()[..], &[LanguageBaseAttributeId::ENGLISH_UTF8]);
        assert_eq!(
            service.profile_version(ServiceClassId::AdvancedAudioDistribution),
            Some(0x0103)
        );
        assert_eq!(service.service_name(), Some("Speaker"));
        assert_eq!(service.provider_name(), Some("Sdpbird"));
        assert_eq!(service.service_description(), None);
        assert_eq!(service.availability(), Some(0xFF));
        assert_eq!(service.time_to_live(), None);
        assert!(service.documentation_url().is_none());
    }

    #[test]
    fn test_attributes_iterate_in_order() {
        let mut store = RecordStore::new();
        let handle = audio_sink(&mut store);
        let list = attribute_list(&store, handle);
        let service = RemoteService::parse(&list).unwrap();
        let ids: Vec<u16, 16> = service.attributes().map(|(id, _)| id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ids.first(), Some(&0x0000));
    }

    #[test]
    fn test_rejects_malformed_lists() {
        // Odd number of children
        assert_eq!(
            RemoteService::parse(&[0x35, 0x03, 0x09, 0x00, 0x01]),
            Err(CodecError::MalformedLength)
        );
        // ID not a UInt16
        assert_eq!(
            RemoteService::parse(&[0x35, 0x04, 0x08, 0x01, 0x08, 0x02]),
            Err(CodecError::UnexpectedKind)
        );
        // Not a sequence
        assert_eq!(RemoteService::parse(&[0x08, 0x01]), Err(CodecError::UnexpectedKind));
        // Trailing data
        assert_eq!(
            RemoteService::parse(&[0x35, 0x00, 0x00]),
            Err(CodecError::MalformedLength)
        );
    }

    #[test]
    fn test_service_list() {
        let mut store = RecordStore::new();
        let first = audio_sink(&mut store);
        let second = audio_sink(&mut store);
        let mut content: Vec<u8, 1024> = Vec::new();
        content.extend_from_slice(&attribute_list(&store, first)).unwrap();
        content.extend_from_slice(&attribute_list(&store, second)).unwrap();
        let outer: Vec<u8, 1100> = DataElement::Sequence(&content).to_vec().unwrap();

        let services = parse_service_list(&outer).unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].handle(), Some(first));
        assert_eq!(services[1].handle(), Some(second));

        assert!(parse_service_list(&[0x35, 0x02, 0x08, 0x01]).is_err());
    }
}

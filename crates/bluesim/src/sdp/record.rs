//! Service records
//!
//! A record belongs to one server connection and shares its handle. The
//! attributes written by [`ServiceRecord::populate_rfcomm_attributes`] and
//! [`ServiceRecord::populate_l2cap_attributes`] follow the usual layout:
//!
//! | ID     | Attribute                | Value                                  |
//! |--------|--------------------------|----------------------------------------|
//! | 0x0000 | ServiceRecordHandle      | u32 handle                             |
//! | 0x0001 | ServiceClassIDList       | sequence of the service class UUID     |
//! | 0x0004 | ProtocolDescriptorList   | L2CAP(+PSM), RFCOMM+channel, OBEX      |
//! | 0x0005 | BrowseGroupList          | PublicBrowseRoot                       |
//! | 0x0100 | ServiceName              | text                                   |

use std::collections::BTreeMap;

use super::types::{AttributeId, DataElement, DEFAULT_ATTRIBUTES};
use crate::gap::BdAddr;
use crate::transport::{ConnectionUrl, Scheme, SecurityLevel};
use crate::uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    handle: u32,
    host: BdAddr,
    attributes: BTreeMap<u16, DataElement>,
}

impl ServiceRecord {
    /// An empty record hosted by `host`
    pub fn new(host: BdAddr, handle: u32) -> Self {
        Self {
            handle,
            host,
            attributes: BTreeMap::new(),
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Address of the device advertising the record
    pub fn host(&self) -> BdAddr {
        self.host
    }

    pub fn attribute(&self, id: u16) -> Option<&DataElement> {
        self.attributes.get(&id)
    }

    /// Attribute IDs present, ascending
    pub fn attribute_ids(&self) -> Vec<u16> {
        self.attributes.keys().copied().collect()
    }

    /// Sets an attribute, or removes it when `value` is `None`
    pub fn set_attribute(&mut self, id: u16, value: Option<DataElement>) {
        match value {
            Some(value) => {
                self.attributes.insert(id, value);
            }
            None => {
                self.attributes.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn populate_common(&mut self, handle: u32, uuid: Uuid, name: &str, protocols: Vec<DataElement>) {
        self.handle = handle;
        self.attributes.insert(
            AttributeId::ServiceRecordHandle.value(),
            DataElement::Unsigned32(handle),
        );
        self.attributes.insert(
            AttributeId::ServiceClassIdList.value(),
            DataElement::Sequence(vec![DataElement::Uuid(uuid)]),
        );
        self.attributes.insert(
            AttributeId::ProtocolDescriptorList.value(),
            DataElement::Sequence(protocols),
        );
        self.attributes.insert(
            AttributeId::BrowseGroupList.value(),
            DataElement::Sequence(vec![DataElement::Uuid(Uuid::PUBLIC_BROWSE_ROOT)]),
        );
        if !name.is_empty() {
            self.attributes.insert(
                AttributeId::ServiceName.value(),
                DataElement::TextString(name.to_string()),
            );
        }
    }

    /// Fills in the attributes of an RFCOMM server on `channel`
    pub fn populate_rfcomm_attributes(&mut self, handle: u32, channel: u8, uuid: Uuid, name: &str, obex: bool) {
        let mut protocols = vec![
            DataElement::Sequence(vec![DataElement::Uuid(Uuid::L2CAP)]),
            DataElement::Sequence(vec![
                DataElement::Uuid(Uuid::RFCOMM),
                DataElement::Unsigned8(channel),
            ]),
        ];
        if obex {
            protocols.push(DataElement::Sequence(vec![DataElement::Uuid(Uuid::OBEX)]));
        }
        self.populate_common(handle, uuid, name, protocols);
    }

    /// Fills in the attributes of an L2CAP server on `psm`
    pub fn populate_l2cap_attributes(&mut self, handle: u32, psm: u16, uuid: Uuid, name: &str) {
        let protocols = vec![DataElement::Sequence(vec![
            DataElement::Uuid(Uuid::L2CAP),
            DataElement::Unsigned16(psm),
        ])];
        self.populate_common(handle, uuid, name, protocols);
    }

    /// Every UUID appearing anywhere in the record
    pub fn service_uuids(&self) -> Vec<Uuid> {
        let mut uuids = Vec::new();
        for value in self.attributes.values() {
            value.collect_uuids(&mut uuids);
        }
        uuids.sort();
        uuids.dedup();
        uuids
    }

    /// True when at least one of `uuids` appears in the record
    pub fn advertises_any(&self, uuids: &[Uuid]) -> bool {
        uuids
            .iter()
            .any(|uuid| self.attributes.values().any(|value| value.contains_uuid(*uuid)))
    }

    pub fn service_name(&self) -> Option<&str> {
        self.attribute(AttributeId::ServiceName.value())?.as_str()
    }

    fn protocol_descriptor(&self, protocol: Uuid) -> Option<&[DataElement]> {
        self.attribute(AttributeId::ProtocolDescriptorList.value())?
            .as_sequence()?
            .iter()
            .filter_map(DataElement::as_sequence)
            .find(|descriptor| descriptor.first().and_then(DataElement::as_uuid) == Some(protocol))
    }

    pub fn rfcomm_channel(&self) -> Option<u8> {
        self.protocol_descriptor(Uuid::RFCOMM)?.get(1)?.as_u8()
    }

    pub fn l2cap_psm(&self) -> Option<u16> {
        self.protocol_descriptor(Uuid::L2CAP)?.get(1)?.as_u16()
    }

    pub fn is_obex(&self) -> bool {
        self.protocol_descriptor(Uuid::OBEX).is_some()
    }

    /// The URL a client would connect to, or `None` when the record carries
    /// neither an RFCOMM channel nor a PSM.
    pub fn connection_url(&self, security: SecurityLevel, must_be_master: bool) -> Option<String> {
        let (scheme, channel) = match (self.rfcomm_channel(), self.l2cap_psm()) {
            (Some(channel), _) if self.is_obex() => (Scheme::Goep, u16::from(channel)),
            (Some(channel), _) => (Scheme::Spp, u16::from(channel)),
            (None, Some(psm)) => (Scheme::L2cap, psm),
            (None, None) => return None,
        };
        Some(ConnectionUrl::new(scheme, self.host, channel, security, must_be_master).to_string())
    }

    /// Copy holding only the default attributes and those in `ids`
    pub fn retrieve(&self, ids: &[u16]) -> ServiceRecord {
        let attributes = self
            .attributes
            .iter()
            .filter(|(id, _)| DEFAULT_ATTRIBUTES.contains(*id) || ids.contains(*id))
            .map(|(id, value)| (*id, value.clone()))
            .collect();
        ServiceRecord {
            handle: self.handle,
            host: self.host,
            attributes,
        }
    }
}

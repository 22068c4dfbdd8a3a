use crate::uuid::Uuid;

/// Value of a service record attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataElement {
    Nil,
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    Signed8(i8),
    Signed16(i16),
    Signed32(i32),
    Signed64(i64),
    TextString(String),
    Boolean(bool),
    Uuid(Uuid),
    Sequence(Vec<DataElement>),
    Alternative(Vec<DataElement>),
    Url(String),
}

impl DataElement {
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            DataElement::Unsigned8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            DataElement::Unsigned16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            DataElement::Unsigned32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataElement::TextString(s) | DataElement::Url(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            DataElement::Uuid(uuid) => Some(*uuid),
            _ => None,
        }
    }

    /// Elements of a sequence or alternative
    pub fn as_sequence(&self) -> Option<&[DataElement]> {
        match self {
            DataElement::Sequence(items) | DataElement::Alternative(items) => Some(items),
            _ => None,
        }
    }

    /// Appends every UUID found in this element, descending into sequences
    pub fn collect_uuids(&self, out: &mut Vec<Uuid>) {
        match self {
            DataElement::Uuid(uuid) => out.push(*uuid),
            DataElement::Sequence(items) | DataElement::Alternative(items) => {
                for item in items {
                    item.collect_uuids(out);
                }
            }
            _ => {}
        }
    }

    pub fn contains_uuid(&self, uuid: Uuid) -> bool {
        match self {
            DataElement::Uuid(own) => *own == uuid,
            DataElement::Sequence(items) | DataElement::Alternative(items) => {
                items.iter().any(|item| item.contains_uuid(uuid))
            }
            _ => false,
        }
    }
}

/// Universal attribute IDs used by the emulated records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeId {
    ServiceRecordHandle = 0x0000,
    ServiceClassIdList = 0x0001,
    ServiceRecordState = 0x0002,
    ServiceId = 0x0003,
    ProtocolDescriptorList = 0x0004,
    BrowseGroupList = 0x0005,
    LanguageBaseAttributeIdList = 0x0006,
    ServiceInfoTimeToLive = 0x0007,
    ServiceAvailability = 0x0008,
    BluetoothProfileDescriptorList = 0x0009,
    DocumentationUrl = 0x000A,
    ClientExecutableUrl = 0x000B,
    IconUrl = 0x000C,
    AdditionalProtocolDescriptorLists = 0x000D,
    /// Primary language offset 0x0100 + 0x0000
    ServiceName = 0x0100,
    ServiceDescription = 0x0101,
    ProviderName = 0x0102,
}

impl AttributeId {
    pub fn value(self) -> u16 {
        self as u16
    }
}

impl From<AttributeId> for u16 {
    fn from(id: AttributeId) -> Self {
        id as u16
    }
}

/// Attributes every search result carries, whatever was requested
pub const DEFAULT_ATTRIBUTES: [u16; 5] = [0x0000, 0x0001, 0x0002, 0x0003, 0x0004];

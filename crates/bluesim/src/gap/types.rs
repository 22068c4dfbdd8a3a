use crate::gap::constants::*;
use bitflags::bitflags;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::stack::BluetoothStack;
use crate::sync::lock;

/// Discoverable mode of a local device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverableMode {
    NotDiscoverable,
    Limited,
    General,
}

impl DiscoverableMode {
    /// Maps an inquiry access code (or 0) to a mode
    pub fn from_access_code(code: u32) -> Option<Self> {
        match code {
            NOT_DISCOVERABLE => Some(DiscoverableMode::NotDiscoverable),
            LIAC => Some(DiscoverableMode::Limited),
            GIAC => Some(DiscoverableMode::General),
            _ => None,
        }
    }

    pub fn access_code(self) -> u32 {
        match self {
            DiscoverableMode::NotDiscoverable => NOT_DISCOVERABLE,
            DiscoverableMode::Limited => LIAC,
            DiscoverableMode::General => GIAC,
        }
    }

    /// Whether a device in this mode answers an inquiry using `access_code`.
    ///
    /// Limited-discoverable devices answer both LIAC and GIAC inquiries.
    pub fn responds_to(self, access_code: u32) -> bool {
        match self {
            DiscoverableMode::NotDiscoverable => false,
            DiscoverableMode::Limited => access_code == LIAC || access_code == GIAC,
            DiscoverableMode::General => access_code == GIAC,
        }
    }
}

/// A 48-bit device address, stored little-endian like on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&value.to_le_bytes()[0..6]);
        Self { bytes }
    }

    pub fn to_u64(self) -> u64 {
        let mut wide = [0u8; 8];
        wide[0..6].copy_from_slice(&self.bytes);
        u64::from_le_bytes(wide)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Twelve upper-case hex digits, most significant first, as used in
    /// connection URLs ("0B1000A1B2C3").
    pub fn to_bluetooth_string(self) -> String {
        let mut be = self.bytes;
        be.reverse();
        hex::encode_upper(be)
    }
}

impl PartialOrd for BdAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BdAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_u64().cmp(&other.to_u64())
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = hex::FromHexError;

    /// Accepts "0B1000A1B2C3" or "0B:10:00:A1:B2:C3".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != ':').collect();
        let mut bytes = [0u8; 6];
        hex::decode_to_slice(&cleaned, &mut bytes)?;
        bytes.reverse();
        Ok(Self { bytes })
    }
}

bitflags! {
    /// Major service classes carried in bits 13..23 of the class of device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServiceClasses: u32 {
        const LIMITED_DISCOVERABLE = 0x00_2000;
        const POSITIONING = 0x01_0000;
        const NETWORKING = 0x02_0000;
        const RENDERING = 0x04_0000;
        const CAPTURING = 0x08_0000;
        const OBJECT_TRANSFER = 0x10_0000;
        const AUDIO = 0x20_0000;
        const TELEPHONY = 0x40_0000;
        const INFORMATION = 0x80_0000;
    }
}

/// 24-bit class of device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceClass(u32);

impl DeviceClass {
    pub const fn new(raw: u32) -> Self {
        Self(raw & CLASS_MASK)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn major_device_class(self) -> u32 {
        self.0 & MAJOR_DEVICE_CLASS_MASK
    }

    pub fn minor_device_class(self) -> u32 {
        self.0 & MINOR_DEVICE_CLASS_MASK
    }

    pub fn service_classes(self) -> ServiceClasses {
        ServiceClasses::from_bits_truncate(self.0 & SERVICE_CLASS_MASK)
    }

    pub fn with_service_classes(self, classes: ServiceClasses) -> Self {
        Self(self.0 | classes.bits())
    }

    pub fn without_service_classes(self, classes: ServiceClasses) -> Self {
        Self(self.0 & !classes.bits())
    }
}

/// A peer device as seen by discovery.
///
/// Equality and hashing use the address only; the friendly name is a lazily
/// filled cache shared between clones.
#[derive(Debug, Clone)]
pub struct RemoteDevice {
    address: BdAddr,
    friendly_name: Arc<Mutex<Option<String>>>,
}

impl RemoteDevice {
    pub fn new(address: BdAddr) -> Self {
        Self {
            address,
            friendly_name: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn with_name(address: BdAddr, name: String) -> Self {
        Self {
            address,
            friendly_name: Arc::new(Mutex::new(Some(name))),
        }
    }

    pub fn address(&self) -> BdAddr {
        self.address
    }

    pub fn bluetooth_address(&self) -> String {
        self.address.to_bluetooth_string()
    }

    /// Returns the cached name, if one has been resolved
    pub fn cached_name(&self) -> Option<String> {
        lock(&self.friendly_name).clone()
    }

    /// Resolves the friendly name through `stack`.
    ///
    /// With `always_ask == false` a cached name is returned without a lookup.
    /// An unreachable device or an empty name yields the address string.
    pub fn friendly_name(&self, stack: &BluetoothStack, always_ask: bool) -> String {
        if !always_ask {
            if let Some(name) = self.cached_name() {
                return name;
            }
        }
        match stack.remote_device_friendly_name(self.address) {
            Ok(name) if !name.is_empty() => {
                *lock(&self.friendly_name) = Some(name.clone());
                name
            }
            _ => self.bluetooth_address(),
        }
    }
}

impl PartialEq for RemoteDevice {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for RemoteDevice {}

impl Hash for RemoteDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

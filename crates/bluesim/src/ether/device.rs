//! Virtual local devices

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use log::{debug, info};

use super::handles::HandleTable;
use crate::config::EmulatorConfig;
use crate::discovery::inquiry::InquirySlot;
use crate::discovery::InquiryState;
use crate::error::{Error, Result};
use crate::gap::{BdAddr, DeviceClass, DiscoverableMode, ServiceClasses, IAC_MAX, IAC_MIN, NOT_DISCOVERABLE};
use crate::sdp::ServiceRegistry;
use crate::sync::{lock, read, write};
use crate::transport::{ChannelAllocator, Connection, ConnectionHandle, Protocol};

/// JSR-82 level implemented by the emulated stack
const API_VERSION: &str = "1.1";

#[derive(Debug)]
struct DeviceState {
    name: String,
    device_class: DeviceClass,
    discoverable: DiscoverableMode,
    powered: bool,
}

/// A device created in an [`Ether`](super::Ether).
///
/// Owns its connection handle table, its advertised service records and the
/// RFCOMM channels and PSMs its servers listen on.
#[derive(Debug)]
pub struct LocalDevice {
    address: BdAddr,
    config: EmulatorConfig,
    state: RwLock<DeviceState>,
    released: AtomicBool,
    connections: HandleTable,
    services: ServiceRegistry,
    channels: Mutex<ChannelAllocator>,
    listeners: Mutex<HashMap<(Protocol, u16), Connection>>,
    inquiry: Mutex<InquirySlot>,
}

impl LocalDevice {
    pub(crate) fn new(address: BdAddr, config: &EmulatorConfig) -> Self {
        let suffix = address.to_bluetooth_string();
        let mut device_class = config.device_class;
        if config.discoverable == DiscoverableMode::Limited {
            device_class = device_class.with_service_classes(ServiceClasses::LIMITED_DISCOVERABLE);
        }
        Self {
            address,
            config: config.clone(),
            state: RwLock::new(DeviceState {
                name: format!("{}-{}", config.name_prefix, &suffix[6..]),
                device_class,
                discoverable: config.discoverable,
                powered: true,
            }),
            released: AtomicBool::new(false),
            connections: HandleTable::new(),
            services: ServiceRegistry::new(config.max_attributes_retrievable),
            channels: Mutex::new(ChannelAllocator::new()),
            listeners: Mutex::new(HashMap::new()),
            inquiry: Mutex::new(InquirySlot::default()),
        }
    }

    pub fn address(&self) -> BdAddr {
        self.address
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn name(&self) -> String {
        read(&self.state).name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        write(&self.state).name = name.into();
    }

    pub fn device_class(&self) -> DeviceClass {
        read(&self.state).device_class
    }

    /// Adds major service class bits to the class of device
    pub fn set_service_classes(&self, classes: ServiceClasses) {
        let mut state = write(&self.state);
        // Only the discoverable mode controls the limited bit
        let classes = classes - ServiceClasses::LIMITED_DISCOVERABLE;
        state.device_class = state.device_class.with_service_classes(classes);
    }

    pub fn discoverable(&self) -> DiscoverableMode {
        read(&self.state).discoverable
    }

    /// Changes the discoverable mode from an inquiry access code.
    ///
    /// Only `NOT_DISCOVERABLE`, `LIAC` and `GIAC` are supported; other codes in
    /// the reserved range return `Ok(false)`, codes outside it are rejected.
    pub fn set_discoverable(&self, access_code: u32) -> Result<bool> {
        if access_code != NOT_DISCOVERABLE && !(IAC_MIN..=IAC_MAX).contains(&access_code) {
            return Err(Error::InvalidParameter(format!(
                "invalid discoverable mode 0x{:06X}",
                access_code
            )));
        }
        self.ensure_active()?;
        let Some(mode) = DiscoverableMode::from_access_code(access_code) else {
            return Ok(false);
        };

        let mut state = write(&self.state);
        state.discoverable = mode;
        state.device_class = if mode == DiscoverableMode::Limited {
            state.device_class.with_service_classes(ServiceClasses::LIMITED_DISCOVERABLE)
        } else {
            state.device_class.without_service_classes(ServiceClasses::LIMITED_DISCOVERABLE)
        };
        debug!("{}: discoverable mode {:?}", self.address, mode);
        Ok(true)
    }

    pub fn is_powered(&self) -> bool {
        read(&self.state).powered
    }

    pub fn set_powered(&self, on: bool) {
        write(&self.state).powered = on;
        info!("{}: powered {}", self.address, if on { "on" } else { "off" });
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::SeqCst)
    }

    /// Powered on and not yet released
    pub fn is_active(&self) -> bool {
        !self.is_released() && self.is_powered()
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::StateError("local device has been released".into()));
        }
        if !self.is_powered() {
            return Err(Error::StateError("Bluetooth system is off".into()));
        }
        Ok(())
    }

    pub fn max_attributes_retrievable(&self) -> usize {
        self.config.max_attributes_retrievable
    }

    pub fn receive_mtu_max(&self) -> u16 {
        self.config.receive_mtu_max
    }

    /// Local device property, by JSR-82 key
    pub fn property(&self, key: &str) -> Option<String> {
        let value = match key {
            "bluetooth.api.version" => API_VERSION.to_string(),
            "bluetooth.sd.attr.retrievable.max" => self.config.max_attributes_retrievable.to_string(),
            "bluetooth.l2cap.receiveMTU.max" => self.config.receive_mtu_max.to_string(),
            "bluetooth.sd.trans.max" => self.config.max_concurrent_searches.to_string(),
            "bluetooth.connected.devices.max" => self.config.max_connected_devices.to_string(),
            "bluetooth.master.switch" => "false".to_string(),
            "bluetooth.connected.inquiry"
            | "bluetooth.connected.page"
            | "bluetooth.connected.inquiry.scan"
            | "bluetooth.connected.page.scan" => "true".to_string(),
            "bluesim.stack" => "emulator".to_string(),
            "bluesim.version" => env!("CARGO_PKG_VERSION").to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn connections(&self) -> &HandleTable {
        &self.connections
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub(crate) fn channels(&self) -> &Mutex<ChannelAllocator> {
        &self.channels
    }

    pub(crate) fn inquiry_slot(&self) -> &Mutex<InquirySlot> {
        &self.inquiry
    }

    pub fn inquiry_state(&self) -> InquiryState {
        lock(&self.inquiry).state()
    }

    /// The server listening on `channel`, if any
    pub fn listener(&self, protocol: Protocol, channel: u16) -> Option<Connection> {
        lock(&self.listeners).get(&(protocol, channel)).cloned()
    }

    pub(crate) fn register_listener(&self, protocol: Protocol, channel: u16, server: Connection) {
        lock(&self.listeners).insert((protocol, channel), server);
    }

    /// Resolves a handle, reporting closed ones as `ConnectionClosed`
    pub fn connection(&self, handle: ConnectionHandle) -> Result<Connection> {
        self.connections.lookup(handle)
    }

    /// Closes `handle` and releases what it held. Returns false when the
    /// handle was already closed.
    pub fn close_connection(&self, handle: ConnectionHandle) -> bool {
        let Some(connection) = self.connections.remove(handle) else {
            return false;
        };
        connection.shutdown();

        if let Some(channel) = connection.server_channel() {
            let protocol = connection.kind().protocol;
            lock(&self.listeners).remove(&(protocol, channel));
            self.services.unregister(handle);
            lock(&self.channels).release(protocol, channel);
            info!("{}: closed {:?} server on {} (handle {})", self.address, protocol, channel, handle);
        } else {
            debug!("{}: closed handle {}", self.address, handle);
        }
        true
    }

    /// Closes every open handle
    pub(crate) fn close_all(&self) {
        for handle in self.connections.handles() {
            self.close_connection(handle);
        }
    }
}

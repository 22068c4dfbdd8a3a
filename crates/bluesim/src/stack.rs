//! Handle-based facade over one local device
//!
//! A [`BluetoothStack`] owns a local device created in an [`Ether`] and
//! releases it when dropped. Connections are addressed by numeric handle and
//! service searches by transaction ID; no connection object crosses this API.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::discovery::{self, DiscoveryListener, EventCollector, InquiryState, SearchCompletion, TransactionId};
use crate::error::{Error, Result};
use crate::ether::{Ether, LocalDevice};
use crate::gap::{BdAddr, DeviceClass, DiscoverableMode, RemoteDevice, ServiceClasses};
use crate::sdp::{AttributeId, ServiceRecord};
use crate::transport::{
    l2cap, rfcomm, ConnectParams, Connection, ConnectionHandle, ConnectionUrl, L2capConnection, Protocol,
    RfcommConnection, SecurityLevel, ServerParams, L2CAP_DEFAULT_MTU, L2CAP_MAX_MTU,
};
use crate::uuid::Uuid;

pub struct BluetoothStack {
    ether: Arc<Ether>,
    device: Arc<LocalDevice>,
}

impl BluetoothStack {
    /// Creates a new local device in `ether`
    pub fn new(ether: &Arc<Ether>) -> Result<Self> {
        let device = ether.create_local_device()?;
        Ok(Self {
            ether: Arc::clone(ether),
            device,
        })
    }

    pub fn ether(&self) -> &Arc<Ether> {
        &self.ether
    }

    pub fn local_device(&self) -> &Arc<LocalDevice> {
        &self.device
    }

    pub fn local_address(&self) -> BdAddr {
        self.device.address()
    }

    pub fn local_bluetooth_address(&self) -> String {
        self.device.address().to_bluetooth_string()
    }

    pub fn local_name(&self) -> String {
        self.device.name()
    }

    pub fn set_local_name(&self, name: impl Into<String>) {
        self.device.set_name(name);
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device.device_class()
    }

    pub fn set_service_classes(&self, classes: ServiceClasses) {
        self.device.set_service_classes(classes);
    }

    pub fn discoverable(&self) -> DiscoverableMode {
        self.device.discoverable()
    }

    pub fn set_discoverable(&self, access_code: u32) -> Result<bool> {
        self.device.set_discoverable(access_code)
    }

    pub fn is_powered_on(&self) -> bool {
        self.device.is_powered()
    }

    pub fn set_powered(&self, on: bool) {
        self.device.set_powered(on);
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.device.property(key)
    }

    // Device discovery

    pub fn start_inquiry(&self, access_code: u32, listener: Arc<dyn DiscoveryListener>) -> Result<()> {
        discovery::inquiry::start(&self.ether, &self.device, access_code, listener)
    }

    /// Cancels the running inquiry if `listener` started it
    pub fn cancel_inquiry<L: DiscoveryListener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        discovery::inquiry::cancel(&self.device, listener)
    }

    pub fn inquiry_state(&self) -> InquiryState {
        self.device.inquiry_state()
    }

    pub fn remote_device_friendly_name(&self, address: BdAddr) -> Result<String> {
        self.device.ensure_active()?;
        Ok(self.ether.reachable(address)?.name())
    }

    // Service discovery

    pub fn search_services(
        &self,
        attr_ids: &[u16],
        uuids: &[Uuid],
        remote: &RemoteDevice,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<TransactionId> {
        discovery::search::start(&self.ether, &self.device, attr_ids, uuids, remote, listener)
    }

    pub fn cancel_service_search(&self, transaction: TransactionId) -> bool {
        self.ether.searches().cancel(transaction)
    }

    /// Fetches further attributes of a record found by a search
    pub fn populate_record(&self, record: &mut ServiceRecord, attr_ids: &[u16]) -> Result<bool> {
        self.device.ensure_active()?;
        let host = self.ether.reachable(record.host())?;
        host.services()
            .populate_attributes(record, attr_ids, self.device.max_attributes_retrievable())
    }

    /// Searches `remote` for each of `uuids` in turn and returns the first
    /// connection URL found.
    ///
    /// Each search is bounded by `timeout`; a search that times out is
    /// cancelled and the next UUID is tried.
    pub fn find_service_url(&self, remote: &RemoteDevice, uuids: &[Uuid], timeout: Duration) -> Result<Option<String>> {
        for uuid in uuids {
            let collector = Arc::new(EventCollector::new());
            let transaction = self.search_services(
                &[AttributeId::ServiceName.value()],
                &[*uuid],
                remote,
                Arc::clone(&collector) as Arc<dyn DiscoveryListener>,
            )?;
            match collector.wait_search(transaction, timeout) {
                Some((records, SearchCompletion::Completed)) => {
                    let url = records
                        .iter()
                        .find_map(|record| record.connection_url(SecurityLevel::NoAuthenticateNoEncrypt, false));
                    if url.is_some() {
                        return Ok(url);
                    }
                }
                Some((_, SearchCompletion::DeviceNotReachable)) => {
                    return Err(Error::DeviceUnreachable(remote.address()));
                }
                Some((_, completion)) => debug!("search for {:?} ended with {:?}", uuid, completion),
                None => {
                    self.cancel_service_search(transaction);
                    debug!("search for {:?} timed out", uuid);
                }
            }
        }
        Ok(None)
    }

    // RFCOMM

    fn rfcomm(&self, handle: ConnectionHandle) -> Result<Arc<RfcommConnection>> {
        self.device.ensure_active()?;
        match self.device.connection(handle)? {
            Connection::Rfcomm(connection) => Ok(connection),
            _ => Err(Error::InvalidParameter(format!("handle {} is not an RFCOMM channel", handle))),
        }
    }

    pub fn rfcomm_connect(&self, params: &ConnectParams) -> Result<ConnectionHandle> {
        rfcomm::connect(&self.ether, &self.device, params)
    }

    pub fn rfcomm_server_open(&self, params: &ServerParams) -> Result<(ConnectionHandle, ServiceRecord)> {
        rfcomm::open_server(&self.device, params)
    }

    pub fn rfcomm_accept(&self, server: ConnectionHandle) -> Result<ConnectionHandle> {
        rfcomm::accept(&self.device, server)
    }

    /// Blocks until data arrives; 0 means end-of-stream
    pub fn rfcomm_read(&self, handle: ConnectionHandle, buf: &mut [u8]) -> Result<usize> {
        self.rfcomm(handle)?.read(buf)
    }

    pub fn rfcomm_read_byte(&self, handle: ConnectionHandle) -> Result<Option<u8>> {
        self.rfcomm(handle)?.read_byte()
    }

    pub fn rfcomm_available(&self, handle: ConnectionHandle) -> Result<usize> {
        self.rfcomm(handle)?.available()
    }

    pub fn rfcomm_write(&self, handle: ConnectionHandle, data: &[u8]) -> Result<()> {
        self.rfcomm(handle)?.write(data)
    }

    pub fn rfcomm_flush(&self, handle: ConnectionHandle) -> Result<()> {
        self.rfcomm(handle)?.flush()
    }

    pub fn rfcomm_remote_address(&self, handle: ConnectionHandle) -> Result<BdAddr> {
        Ok(self.rfcomm(handle)?.remote_address())
    }

    // L2CAP

    fn l2cap(&self, handle: ConnectionHandle) -> Result<Arc<L2capConnection>> {
        self.device.ensure_active()?;
        match self.device.connection(handle)? {
            Connection::L2cap(connection) => Ok(connection),
            _ => Err(Error::InvalidParameter(format!("handle {} is not an L2CAP channel", handle))),
        }
    }

    pub fn l2cap_connect(&self, params: &ConnectParams, receive_mtu: u16, transmit_mtu: u16) -> Result<ConnectionHandle> {
        l2cap::connect(&self.ether, &self.device, params, receive_mtu, transmit_mtu)
    }

    pub fn l2cap_server_open(
        &self,
        params: &ServerParams,
        receive_mtu: u16,
        transmit_mtu: u16,
    ) -> Result<(ConnectionHandle, ServiceRecord)> {
        l2cap::open_server(&self.device, params, receive_mtu, transmit_mtu)
    }

    pub fn l2cap_accept(&self, server: ConnectionHandle) -> Result<ConnectionHandle> {
        l2cap::accept(&self.device, server)
    }

    pub fn l2cap_send(&self, handle: ConnectionHandle, data: &[u8]) -> Result<()> {
        self.l2cap(handle)?.send(data)
    }

    /// Blocks for the next packet; `None` means end-of-stream
    pub fn l2cap_receive(&self, handle: ConnectionHandle, buf: &mut [u8]) -> Result<Option<usize>> {
        self.l2cap(handle)?.receive(buf)
    }

    pub fn l2cap_ready(&self, handle: ConnectionHandle) -> Result<bool> {
        self.l2cap(handle)?.ready()
    }

    pub fn l2cap_receive_mtu(&self, handle: ConnectionHandle) -> Result<u16> {
        Ok(self.l2cap(handle)?.receive_mtu())
    }

    pub fn l2cap_transmit_mtu(&self, handle: ConnectionHandle) -> Result<u16> {
        Ok(self.l2cap(handle)?.transmit_mtu())
    }

    pub fn l2cap_remote_address(&self, handle: ConnectionHandle) -> Result<BdAddr> {
        Ok(self.l2cap(handle)?.remote_address())
    }

    // Both families

    /// Opens a client connection from a `btspp`, `btgoep` or `btl2cap` URL
    pub fn connect_url(&self, url: &str) -> Result<ConnectionHandle> {
        let url: ConnectionUrl = url.parse().map_err(|e| Error::InvalidParameter(format!("{}", e)))?;
        let params = ConnectParams {
            address: url.address,
            channel: url.channel,
            security: url.security(),
        };
        match url.scheme.protocol() {
            Protocol::Rfcomm => self.rfcomm_connect(&params),
            Protocol::L2cap => {
                let receive_mtu = url
                    .receive_mtu
                    .unwrap_or_else(|| L2CAP_DEFAULT_MTU.min(self.device.receive_mtu_max()));
                let transmit_mtu = url.transmit_mtu.unwrap_or(L2CAP_MAX_MTU);
                self.l2cap_connect(&params, receive_mtu, transmit_mtu)
            }
        }
    }

    /// Closes any handle. Closing a server also withdraws its service record.
    /// Returns false when the handle was already closed.
    pub fn close(&self, handle: ConnectionHandle) -> bool {
        self.device.close_connection(handle)
    }

    /// Actual security level of `handle`; `expected` is what the caller
    /// believes it to be
    pub fn security_opt(&self, handle: ConnectionHandle, expected: SecurityLevel) -> Result<SecurityLevel> {
        let actual = match self.device.connection(handle)? {
            Connection::Rfcomm(c) => c.security().level(),
            Connection::L2cap(c) => c.security().level(),
            Connection::RfcommServer(s) => s.security_level(),
            Connection::L2capServer(s) => s.security_level(),
        };
        if actual != expected {
            debug!("handle {}: security {:?}, expected {:?}", handle, actual, expected);
        }
        Ok(actual)
    }

    /// Switches encryption of the link to `address` carried by `handle`.
    /// Returns false when `handle` is not connected to `address`.
    pub fn encrypt(&self, address: BdAddr, handle: ConnectionHandle, on: bool) -> Result<bool> {
        let connection = self.device.connection(handle)?;
        let Some(security) = connection.security() else {
            return Err(Error::InvalidParameter(format!("handle {} is a server", handle)));
        };
        if connection.remote_address() != Some(address) {
            return Ok(false);
        }
        security.set_encrypted(on);
        debug!("handle {}: encryption {}", handle, if on { "on" } else { "off" });
        Ok(true)
    }

    /// Re-advertises the record of the open server `server`
    pub fn update_service_record(&self, server: ConnectionHandle, record: &ServiceRecord) -> Result<ServiceRecord> {
        let connection = self
            .device
            .connections()
            .get(server)
            .map_err(|_| Error::ServiceRegistration(format!("handle {} is not open", server)))?;
        if !connection.is_server() {
            return Err(Error::ServiceRegistration(format!("handle {} is not a server", server)));
        }
        if record.handle() != server || record.host() != self.local_address() {
            return Err(Error::InvalidParameter(format!(
                "record 0x{:08X} does not belong to server {}",
                record.handle(),
                server
            )));
        }
        let updated = self.device.services().update(record)?;
        info!("{}: service record of handle {} updated", self.local_address(), server);
        Ok(updated)
    }
}

impl Drop for BluetoothStack {
    fn drop(&mut self) {
        self.ether.release_local_device(&self.device);
    }
}

//! RFCOMM-like stream channels

use std::sync::Arc;

use log::{debug, info};

use super::connection::Connection;
use super::link::{link_pair, Incoming, LinkEnd, ServerPort};
use super::types::{ConnectParams, ConnectionHandle, LinkSecurity, Protocol, SecurityLevel, ServerParams};
use super::{RFCOMM_CHANNEL_MAX, RFCOMM_CHANNEL_MIN};
use crate::error::{Error, Result};
use crate::ether::{Ether, LocalDevice};
use crate::gap::BdAddr;
use crate::sdp::ServiceRecord;
use crate::sync::lock;

/// A listening RFCOMM server
#[derive(Debug)]
pub struct RfcommService {
    channel: u8,
    security: SecurityLevel,
    obex: bool,
    port: ServerPort,
}

impl RfcommService {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security
    }

    pub fn is_obex(&self) -> bool {
        self.obex
    }

    pub fn is_closed(&self) -> bool {
        self.port.is_closed()
    }

    pub(crate) fn close(&self) {
        self.port.close();
    }
}

/// One end of a connected RFCOMM stream
#[derive(Debug)]
pub struct RfcommConnection {
    end: LinkEnd,
    remote: BdAddr,
    security: LinkSecurity,
    initiator: bool,
}

impl RfcommConnection {
    fn new(end: LinkEnd, remote: BdAddr, security: SecurityLevel, initiator: bool) -> Self {
        Self {
            end,
            remote,
            security: LinkSecurity::new(security),
            initiator,
        }
    }

    pub fn remote_address(&self) -> BdAddr {
        self.remote
    }

    pub fn security(&self) -> &LinkSecurity {
        &self.security
    }

    /// True for the side that called connect
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Blocks until at least one byte arrives; 0 means end-of-stream
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.end.read(buf)
    }

    pub fn read_byte(&self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.end.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    pub fn available(&self) -> Result<usize> {
        self.end.available()
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return self.end.flush();
        }
        self.end.send(data.to_vec())
    }

    pub fn flush(&self) -> Result<()> {
        self.end.flush()
    }

    pub(crate) fn close(&self) {
        self.end.close();
    }
}

fn checked_channel(channel: u16) -> Result<u8> {
    u8::try_from(channel)
        .ok()
        .filter(|c| (RFCOMM_CHANNEL_MIN..=RFCOMM_CHANNEL_MAX).contains(c))
        .ok_or_else(|| Error::InvalidParameter(format!("invalid RFCOMM channel {}", channel)))
}

/// Connects `local` to the server listening on `params.channel` of the
/// target device. Does not wait for the server to accept.
pub(crate) fn connect(ether: &Ether, local: &LocalDevice, params: &ConnectParams) -> Result<ConnectionHandle> {
    local.ensure_active()?;
    let channel = checked_channel(params.channel)?;
    let target = ether.reachable(params.address)?;

    let service = match target.listener(Protocol::Rfcomm, u16::from(channel)) {
        Some(Connection::RfcommServer(service)) => service,
        _ => return Err(Error::ConnectionRefused),
    };

    // Emulated pairing always succeeds, so the stronger requirement wins
    let level = params.security.level().max(service.security);
    let (client_end, server_end) = link_pair();
    service.port.offer(Incoming {
        remote: local.address(),
        end: server_end,
        security: level,
        peer_receive_mtu: 0,
    })?;

    let conn = Arc::new(RfcommConnection::new(client_end, params.address, level, true));
    let handle = local
        .connections()
        .add(Connection::Rfcomm(Arc::clone(&conn)))
        .inspect_err(|_| conn.close())?;
    debug!(
        "{}: RFCOMM connected to {} channel {} as handle {}",
        local.address(),
        params.address,
        channel,
        handle
    );
    Ok(handle)
}

/// Opens a server on the lowest free channel and registers its record
pub(crate) fn open_server(local: &LocalDevice, params: &ServerParams) -> Result<(ConnectionHandle, ServiceRecord)> {
    local.ensure_active()?;
    let channel = lock(local.channels()).allocate_rfcomm()?;

    let service = Arc::new(RfcommService {
        channel,
        security: params.security.level(),
        obex: params.obex,
        port: ServerPort::default(),
    });
    let server = Connection::RfcommServer(Arc::clone(&service));
    let handle = match local.connections().add(server.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            lock(local.channels()).release(Protocol::Rfcomm, u16::from(channel));
            return Err(e);
        }
    };

    let mut record = ServiceRecord::new(local.address(), handle);
    record.populate_rfcomm_attributes(handle, channel, params.uuid, &params.name, params.obex);
    if let Err(e) = local.services().register(record.clone()) {
        local.close_connection(handle);
        return Err(e);
    }
    local.register_listener(Protocol::Rfcomm, u16::from(channel), server);

    info!(
        "{}: RFCOMM server '{}' ({:?}) listening on channel {} as handle {}",
        local.address(),
        params.name,
        params.uuid,
        channel,
        handle
    );
    Ok((handle, record))
}

/// Blocks until a client connects to `server`, then returns the handle of
/// the new peer-facing channel. The server stays open.
pub(crate) fn accept(local: &LocalDevice, server: ConnectionHandle) -> Result<ConnectionHandle> {
    local.ensure_active()?;
    let service = match local.connection(server)? {
        Connection::RfcommServer(service) => service,
        _ => return Err(Error::InvalidParameter(format!("handle {} is not an RFCOMM server", server))),
    };

    let incoming = service.port.accept()?;
    let conn = Arc::new(RfcommConnection::new(
        incoming.end,
        incoming.remote,
        incoming.security,
        false,
    ));
    let handle = local
        .connections()
        .add(Connection::Rfcomm(Arc::clone(&conn)))
        .inspect_err(|_| conn.close())?;
    debug!(
        "{}: accepted RFCOMM client {} on channel {} as handle {}",
        local.address(),
        incoming.remote,
        service.channel,
        handle
    );
    Ok(handle)
}

//! L2CAP-like packet channels
//!
//! Unlike RFCOMM streams, L2CAP channels preserve packet boundaries and carry
//! a negotiated MTU in each direction:
//! - receive MTU is what this end asked for when connecting or opening
//! - transmit MTU is the smaller of what this end may send and what the
//!   peer can receive
//!
//! `send` truncates packets longer than the transmit MTU and `receive`
//! discards the part of a packet that does not fit the caller's buffer.

use std::sync::Arc;

use log::{debug, info};

use super::connection::Connection;
use super::link::{link_pair, Incoming, LinkEnd, ServerPort};
use super::types::{ConnectParams, ConnectionHandle, LinkSecurity, Protocol, SecurityLevel, ServerParams};
use super::L2CAP_MIN_MTU;
use crate::error::{Error, Result};
use crate::ether::{Ether, LocalDevice};
use crate::gap::BdAddr;
use crate::sdp::ServiceRecord;
use crate::sync::lock;

/// A listening L2CAP server
#[derive(Debug)]
pub struct L2capService {
    psm: u16,
    receive_mtu: u16,
    transmit_mtu: u16,
    security: SecurityLevel,
    port: ServerPort,
}

impl L2capService {
    pub fn psm(&self) -> u16 {
        self.psm
    }

    pub fn receive_mtu(&self) -> u16 {
        self.receive_mtu
    }

    pub fn transmit_mtu(&self) -> u16 {
        self.transmit_mtu
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security
    }

    pub fn is_closed(&self) -> bool {
        self.port.is_closed()
    }

    pub(crate) fn close(&self) {
        self.port.close();
    }
}

/// One end of a connected L2CAP channel
#[derive(Debug)]
pub struct L2capConnection {
    end: LinkEnd,
    remote: BdAddr,
    receive_mtu: u16,
    transmit_mtu: u16,
    security: LinkSecurity,
    initiator: bool,
}

impl L2capConnection {
    pub fn remote_address(&self) -> BdAddr {
        self.remote
    }

    pub fn receive_mtu(&self) -> u16 {
        self.receive_mtu
    }

    pub fn transmit_mtu(&self) -> u16 {
        self.transmit_mtu
    }

    pub fn security(&self) -> &LinkSecurity {
        &self.security
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Sends one packet, keeping only the first `transmit_mtu` bytes
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let len = data.len().min(usize::from(self.transmit_mtu));
        self.end.send(data[..len].to_vec())
    }

    /// Blocks for the next packet. Returns the number of bytes copied into
    /// `buf`, or `None` at end-of-stream.
    pub fn receive(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        Ok(self.end.receive()?.map(|packet| {
            let n = packet.len().min(buf.len());
            buf[..n].copy_from_slice(&packet[..n]);
            n
        }))
    }

    /// Whether `receive` would return without blocking
    pub fn ready(&self) -> Result<bool> {
        self.end.ready()
    }

    pub(crate) fn close(&self) {
        self.end.close();
    }
}

/// Rejects MTUs the local device cannot honor
pub(crate) fn validate_mtu(local: &LocalDevice, receive_mtu: u16, transmit_mtu: u16) -> Result<()> {
    if receive_mtu < L2CAP_MIN_MTU || receive_mtu > local.receive_mtu_max() {
        return Err(Error::InvalidParameter(format!("invalid ReceiveMTU value {}", receive_mtu)));
    }
    if transmit_mtu < L2CAP_MIN_MTU {
        return Err(Error::InvalidParameter(format!("invalid TransmitMTU value {}", transmit_mtu)));
    }
    Ok(())
}

pub(crate) fn connect(
    ether: &Ether,
    local: &LocalDevice,
    params: &ConnectParams,
    receive_mtu: u16,
    transmit_mtu: u16,
) -> Result<ConnectionHandle> {
    validate_mtu(local, receive_mtu, transmit_mtu)?;
    local.ensure_active()?;
    let target = ether.reachable(params.address)?;

    let service = match target.listener(Protocol::L2cap, params.channel) {
        Some(Connection::L2capServer(service)) => service,
        _ => return Err(Error::ConnectionRefused),
    };

    let level = params.security.level().max(service.security);
    let (client_end, server_end) = link_pair();
    service.port.offer(Incoming {
        remote: local.address(),
        end: server_end,
        security: level,
        peer_receive_mtu: receive_mtu,
    })?;

    let conn = Arc::new(L2capConnection {
        end: client_end,
        remote: params.address,
        receive_mtu,
        transmit_mtu: transmit_mtu.min(service.receive_mtu),
        security: LinkSecurity::new(level),
        initiator: true,
    });
    let handle = local
        .connections()
        .add(Connection::L2cap(Arc::clone(&conn)))
        .inspect_err(|_| conn.close())?;
    debug!(
        "{}: L2CAP connected to {} PSM 0x{:04X} as handle {} (rx {}, tx {})",
        local.address(),
        params.address,
        params.channel,
        handle,
        conn.receive_mtu,
        conn.transmit_mtu
    );
    Ok(handle)
}

pub(crate) fn open_server(
    local: &LocalDevice,
    params: &ServerParams,
    receive_mtu: u16,
    transmit_mtu: u16,
) -> Result<(ConnectionHandle, ServiceRecord)> {
    validate_mtu(local, receive_mtu, transmit_mtu)?;
    local.ensure_active()?;
    let psm = lock(local.channels()).allocate_psm(params.psm)?;

    let service = Arc::new(L2capService {
        psm,
        receive_mtu,
        transmit_mtu,
        security: params.security.level(),
        port: ServerPort::default(),
    });
    let server = Connection::L2capServer(Arc::clone(&service));
    let handle = match local.connections().add(server.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            lock(local.channels()).release(Protocol::L2cap, psm);
            return Err(e);
        }
    };

    let mut record = ServiceRecord::new(local.address(), handle);
    record.populate_l2cap_attributes(handle, psm, params.uuid, &params.name);
    if let Err(e) = local.services().register(record.clone()) {
        local.close_connection(handle);
        return Err(e);
    }
    local.register_listener(Protocol::L2cap, psm, server);

    info!(
        "{}: L2CAP server '{}' ({:?}) listening on PSM 0x{:04X} as handle {}",
        local.address(),
        params.name,
        params.uuid,
        psm,
        handle
    );
    Ok((handle, record))
}

pub(crate) fn accept(local: &LocalDevice, server: ConnectionHandle) -> Result<ConnectionHandle> {
    local.ensure_active()?;
    let service = match local.connection(server)? {
        Connection::L2capServer(service) => service,
        _ => return Err(Error::InvalidParameter(format!("handle {} is not an L2CAP server", server))),
    };

    let incoming = service.port.accept()?;
    let conn = Arc::new(L2capConnection {
        end: incoming.end,
        remote: incoming.remote,
        receive_mtu: service.receive_mtu,
        transmit_mtu: service.transmit_mtu.min(incoming.peer_receive_mtu),
        security: LinkSecurity::new(incoming.security),
        initiator: false,
    });
    let handle = local
        .connections()
        .add(Connection::L2cap(Arc::clone(&conn)))
        .inspect_err(|_| conn.close())?;
    debug!(
        "{}: accepted L2CAP client {} on PSM 0x{:04X} as handle {}",
        local.address(),
        conn.remote,
        service.psm,
        handle
    );
    Ok(handle)
}

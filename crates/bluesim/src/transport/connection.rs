use std::sync::Arc;

use super::l2cap::{L2capConnection, L2capService};
use super::rfcomm::{RfcommConnection, RfcommService};
use super::types::{LinkSecurity, Protocol};
use crate::gap::BdAddr;

/// Whether an entry is a connected channel or a listening server.
///
/// Channels returned by `accept` are `Client`-shaped too: they are the
/// server's peer-facing half of a connected pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKind {
    pub protocol: Protocol,
    pub role: Role,
}

/// A live entry of a device's handle table
#[derive(Debug, Clone)]
pub enum Connection {
    Rfcomm(Arc<RfcommConnection>),
    RfcommServer(Arc<RfcommService>),
    L2cap(Arc<L2capConnection>),
    L2capServer(Arc<L2capService>),
}

impl Connection {
    pub fn kind(&self) -> ConnectionKind {
        let (protocol, role) = match self {
            Connection::Rfcomm(_) => (Protocol::Rfcomm, Role::Client),
            Connection::RfcommServer(_) => (Protocol::Rfcomm, Role::Server),
            Connection::L2cap(_) => (Protocol::L2cap, Role::Client),
            Connection::L2capServer(_) => (Protocol::L2cap, Role::Server),
        };
        ConnectionKind { protocol, role }
    }

    pub fn is_server(&self) -> bool {
        self.kind().role == Role::Server
    }

    /// Peer address of a connected channel; servers have none
    pub fn remote_address(&self) -> Option<BdAddr> {
        match self {
            Connection::Rfcomm(c) => Some(c.remote_address()),
            Connection::L2cap(c) => Some(c.remote_address()),
            _ => None,
        }
    }

    pub fn security(&self) -> Option<&LinkSecurity> {
        match self {
            Connection::Rfcomm(c) => Some(c.security()),
            Connection::L2cap(c) => Some(c.security()),
            _ => None,
        }
    }

    /// Channel number or PSM a server listens on
    pub fn server_channel(&self) -> Option<u16> {
        match self {
            Connection::RfcommServer(s) => Some(u16::from(s.channel())),
            Connection::L2capServer(s) => Some(s.psm()),
            _ => None,
        }
    }

    /// Tears down the transport side: hangs up links and stops listening.
    /// Handle-table and record cleanup are the owning device's job.
    pub(crate) fn shutdown(&self) {
        match self {
            Connection::Rfcomm(c) => c.close(),
            Connection::RfcommServer(s) => s.close(),
            Connection::L2cap(c) => c.close(),
            Connection::L2capServer(s) => s.close(),
        }
    }
}

//! Type definitions shared by both transport families

use std::sync::atomic::{AtomicU8, Ordering};

use crate::gap::BdAddr;
use crate::uuid::Uuid;

/// Opaque per-device connection handle. Never zero.
pub type ConnectionHandle = u32;

/// Transport family of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// Stream channels addressed by an RFCOMM channel number
    Rfcomm,
    /// Packet channels addressed by a PSM
    L2cap,
}

/// Link security level, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SecurityLevel {
    NoAuthenticateNoEncrypt = 0,
    AuthenticateNoEncrypt = 1,
    AuthenticateEncrypt = 2,
}

impl SecurityLevel {
    /// Encryption implies authentication.
    pub fn from_flags(authenticate: bool, encrypt: bool) -> Self {
        if encrypt {
            SecurityLevel::AuthenticateEncrypt
        } else if authenticate {
            SecurityLevel::AuthenticateNoEncrypt
        } else {
            SecurityLevel::NoAuthenticateNoEncrypt
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SecurityLevel::NoAuthenticateNoEncrypt,
            1 => SecurityLevel::AuthenticateNoEncrypt,
            _ => SecurityLevel::AuthenticateEncrypt,
        }
    }

    pub fn authenticate(self) -> bool {
        self != SecurityLevel::NoAuthenticateNoEncrypt
    }

    pub fn encrypt(self) -> bool {
        self == SecurityLevel::AuthenticateEncrypt
    }
}

/// Security requested when opening a client or server endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityOptions {
    pub authenticate: bool,
    pub encrypt: bool,
}

impl SecurityOptions {
    pub fn level(self) -> SecurityLevel {
        SecurityLevel::from_flags(self.authenticate, self.encrypt)
    }
}

/// Mutable security state of one connected channel
#[derive(Debug)]
pub struct LinkSecurity {
    level: AtomicU8,
}

impl LinkSecurity {
    pub(crate) fn new(level: SecurityLevel) -> Self {
        Self {
            level: AtomicU8::new(level as u8),
        }
    }

    pub fn level(&self) -> SecurityLevel {
        SecurityLevel::from_raw(self.level.load(Ordering::SeqCst))
    }

    /// Switches encryption on or off. Turning it off keeps authentication.
    pub(crate) fn set_encrypted(&self, on: bool) {
        let level = if on {
            SecurityLevel::AuthenticateEncrypt
        } else {
            match self.level() {
                SecurityLevel::AuthenticateEncrypt => SecurityLevel::AuthenticateNoEncrypt,
                other => other,
            }
        };
        self.level.store(level as u8, Ordering::SeqCst);
    }
}

/// Parameters of a client connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectParams {
    /// Address of the device the server lives on
    pub address: BdAddr,
    /// RFCOMM channel or L2CAP PSM
    pub channel: u16,
    pub security: SecurityOptions,
}

impl ConnectParams {
    pub fn new(address: BdAddr, channel: u16) -> Self {
        Self {
            address,
            channel,
            security: SecurityOptions::default(),
        }
    }
}

/// Parameters of a server open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerParams {
    /// Service class UUID advertised by the record
    pub uuid: Uuid,
    /// Human-readable service name (attribute 0x0100)
    pub name: String,
    pub security: SecurityOptions,
    /// Advertise OBEX on top of RFCOMM
    pub obex: bool,
    /// Explicit L2CAP PSM; a dynamic one is allocated when `None`
    pub psm: Option<u16>,
}

impl ServerParams {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            security: SecurityOptions::default(),
            obex: false,
            psm: None,
        }
    }
}

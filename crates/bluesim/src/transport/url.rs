//! Connection URLs as advertised by service records
//!
//! `btspp://0B1000A1B2C3:1;authenticate=false;encrypt=false;master=false`
//! `btl2cap://0B1000A1B2C3:1001;authenticate=true;encrypt=false;master=false`
//!
//! RFCOMM channels are decimal, L2CAP PSMs are hex.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::types::{Protocol, SecurityLevel, SecurityOptions};
use crate::gap::BdAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Serial port profile over RFCOMM
    Spp,
    /// OBEX over RFCOMM
    Goep,
    L2cap,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Spp => "btspp",
            Scheme::Goep => "btgoep",
            Scheme::L2cap => "btl2cap",
        }
    }

    pub fn protocol(self) -> Protocol {
        match self {
            Scheme::Spp | Scheme::Goep => Protocol::Rfcomm,
            Scheme::L2cap => Protocol::L2cap,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlParseError {
    #[error("unknown scheme '{0}'")]
    UnknownScheme(String),
    #[error("malformed URL")]
    Malformed,
    #[error("invalid device address '{0}'")]
    InvalidAddress(String),
    #[error("invalid channel '{0}'")]
    InvalidChannel(String),
    #[error("invalid parameter '{0}'")]
    InvalidParameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    pub scheme: Scheme,
    pub address: BdAddr,
    /// RFCOMM channel or L2CAP PSM
    pub channel: u16,
    pub authenticate: bool,
    pub encrypt: bool,
    pub master: bool,
    /// L2CAP only
    pub receive_mtu: Option<u16>,
    /// L2CAP only
    pub transmit_mtu: Option<u16>,
}

impl ConnectionUrl {
    pub fn new(scheme: Scheme, address: BdAddr, channel: u16, security: SecurityLevel, master: bool) -> Self {
        Self {
            scheme,
            address,
            channel,
            authenticate: security.authenticate(),
            encrypt: security.encrypt(),
            master,
            receive_mtu: None,
            transmit_mtu: None,
        }
    }

    pub fn security(&self) -> SecurityOptions {
        SecurityOptions {
            authenticate: self.authenticate || self.encrypt,
            encrypt: self.encrypt,
        }
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:", self.scheme.as_str(), self.address.to_bluetooth_string())?;
        match self.scheme {
            Scheme::L2cap => write!(f, "{:04X}", self.channel)?,
            _ => write!(f, "{}", self.channel)?,
        }
        write!(
            f,
            ";authenticate={};encrypt={};master={}",
            self.authenticate, self.encrypt, self.master
        )?;
        if let Some(mtu) = self.receive_mtu {
            write!(f, ";ReceiveMTU={}", mtu)?;
        }
        if let Some(mtu) = self.transmit_mtu {
            write!(f, ";TransmitMTU={}", mtu)?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, UrlParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(UrlParseError::InvalidParameter(format!("{}={}", key, value))),
    }
}

impl FromStr for ConnectionUrl {
    type Err = UrlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s.split_once("://").ok_or(UrlParseError::Malformed)?;
        let scheme = match scheme {
            "btspp" => Scheme::Spp,
            "btgoep" => Scheme::Goep,
            "btl2cap" => Scheme::L2cap,
            other => return Err(UrlParseError::UnknownScheme(other.to_string())),
        };

        let mut parts = rest.split(';');
        let target = parts.next().ok_or(UrlParseError::Malformed)?;
        let (address, channel) = target.split_once(':').ok_or(UrlParseError::Malformed)?;
        if address.len() != 12 {
            return Err(UrlParseError::InvalidAddress(address.to_string()));
        }
        let address: BdAddr = address
            .parse()
            .map_err(|_| UrlParseError::InvalidAddress(address.to_string()))?;
        let radix = if scheme == Scheme::L2cap { 16 } else { 10 };
        let channel = u16::from_str_radix(channel, radix)
            .map_err(|_| UrlParseError::InvalidChannel(channel.to_string()))?;

        let mut url = ConnectionUrl {
            scheme,
            address,
            channel,
            authenticate: false,
            encrypt: false,
            master: false,
            receive_mtu: None,
            transmit_mtu: None,
        };
        for param in parts.filter(|p| !p.is_empty()) {
            let (key, value) = param
                .split_once('=')
                .ok_or_else(|| UrlParseError::InvalidParameter(param.to_string()))?;
            match key {
                "authenticate" => url.authenticate = parse_bool(key, value)?,
                "encrypt" => url.encrypt = parse_bool(key, value)?,
                "master" => url.master = parse_bool(key, value)?,
                "ReceiveMTU" | "TransmitMTU" if scheme == Scheme::L2cap => {
                    let mtu = value
                        .parse::<u16>()
                        .map_err(|_| UrlParseError::InvalidParameter(param.to_string()))?;
                    if key == "ReceiveMTU" {
                        url.receive_mtu = Some(mtu);
                    } else {
                        url.transmit_mtu = Some(mtu);
                    }
                }
                // Accepted for compatibility, no effect in the emulator
                "authorize" | "name" => {}
                _ => return Err(UrlParseError::InvalidParameter(param.to_string())),
            }
        }
        Ok(url)
    }
}

//! Connection-oriented transports of the emulated stack
//!
//! Two protocol families share one contract shape:
//! - RFCOMM-like byte streams addressed by a channel number (1..=30)
//! - L2CAP-like packet channels addressed by a PSM, with negotiated MTUs
//!
//! Both are carried over in-memory links between local devices of the same
//! [`Ether`](crate::ether::Ether). Every live endpoint is stored in the owning
//! device's handle table as a [`Connection`].

pub mod connection;
pub mod l2cap;
mod link;
pub mod psm;
pub mod rfcomm;
pub mod types;
pub mod url;

pub use self::connection::{Connection, ConnectionKind, Role};
pub use self::l2cap::{L2capConnection, L2capService};
pub use self::psm::{ChannelAllocator, PSM_DYNAMIC_MIN};
pub use self::rfcomm::{RfcommConnection, RfcommService};
pub use self::types::*;
pub use self::url::{ConnectionUrl, Scheme, UrlParseError};

/// Default L2CAP MTU for basic mode channels
pub const L2CAP_DEFAULT_MTU: u16 = 672;
/// Smallest MTU an L2CAP channel may be configured with
pub const L2CAP_MIN_MTU: u16 = 48;
/// Largest representable L2CAP MTU
pub const L2CAP_MAX_MTU: u16 = 0xFFFF;

pub const RFCOMM_CHANNEL_MIN: u8 = 1;
pub const RFCOMM_CHANNEL_MAX: u8 = 30;

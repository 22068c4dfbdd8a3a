//! BlueSim - An in-process emulated Bluetooth stack
//!
//! This library lets code exercise classic Bluetooth workflows without radio
//! hardware. Virtual devices live in a shared [`Ether`] and can discover each
//! other with inquiries, search each other's service records and talk over
//! RFCOMM-like streams and L2CAP-like packet channels.
//!
//! Most callers use [`BluetoothStack`], which owns one local device and
//! addresses every connection by numeric handle and every service search by
//! transaction ID. Discovery results arrive on a [`DiscoveryListener`] from a
//! background worker.

pub mod config;
pub mod discovery;
pub mod error;
pub mod ether;
pub mod gap;
pub mod sdp;
pub mod stack;
mod sync;
pub mod transport;
pub mod uuid;

// Re-export common types for convenience
pub use config::EmulatorConfig;
pub use discovery::{
    DiscoveryEvent, DiscoveryListener, EventCollector, InquiryCompletion, InquiryState, SearchCompletion,
    TransactionId, NO_TRANSACTION,
};
pub use error::{Error, Result};
pub use ether::{Ether, LocalDevice};
pub use gap::{BdAddr, DeviceClass, DiscoverableMode, RemoteDevice, ServiceClasses, GIAC, LIAC};
pub use sdp::{DataElement, ServiceRecord};
pub use stack::BluetoothStack;
pub use transport::{
    ConnectParams, ConnectionHandle, ConnectionUrl, SecurityLevel, SecurityOptions, ServerParams,
};
pub use uuid::Uuid;

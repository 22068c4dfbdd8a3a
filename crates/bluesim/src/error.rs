//! Error types for the bluesim library
//!
//! This module defines the error type shared by every synchronous operation
//! of the emulated stack. Asynchronous discovery failures are not reported
//! here; they arrive as terminal codes on a `DiscoveryListener`.

use crate::gap::BdAddr;
use thiserror::Error;

/// Errors returned by the emulated stack
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Another inquiry already running")]
    AlreadyRunning,

    #[error("Device {0} not reachable")]
    DeviceUnreachable(BdAddr),

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not found")]
    NotFound,

    #[error("Invalid state: {0}")]
    StateError(String),

    #[error("Resource limit reached")]
    ResourceLimitReached,

    #[error("Service registration failed: {0}")]
    ServiceRegistration(String),
}

/// Result type for stack operations
pub type Result<T> = std::result::Result<T, Error>;

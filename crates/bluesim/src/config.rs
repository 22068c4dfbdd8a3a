//! Emulator configuration
//!
//! An `EmulatorConfig` is owned by the [`Ether`](crate::ether::Ether) and
//! copied into every local device when it is created, so changing the
//! configuration of a running ether only affects devices created afterwards.

use std::time::Duration;

use crate::gap::{DeviceClass, DiscoverableMode, MAJOR_COMPUTER};
use crate::transport::L2CAP_MAX_MTU;

/// Tunable limits and timings of the simulated ether
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Upper 24 bits of every generated device address
    pub address_prefix: u64,
    /// Prefix of the friendly name given to new devices
    pub name_prefix: String,
    /// Class of device given to new devices
    pub device_class: DeviceClass,
    /// Initial discoverable mode of new devices
    pub discoverable: DiscoverableMode,
    /// Maximum number of attribute IDs in one retrieval request
    pub max_attributes_retrievable: usize,
    /// Largest receive MTU an L2CAP channel may ask for
    pub receive_mtu_max: u16,
    /// Maximum number of simultaneous service searches per device
    pub max_concurrent_searches: usize,
    /// Reported as `bluetooth.connected.devices.max`
    pub max_connected_devices: usize,
    /// How long an inquiry stays running when not cancelled
    pub inquiry_duration: Duration,
    /// Simulated delay before a service search reads the remote records
    pub search_latency: Duration,
    /// How many random addresses to try before giving up on a collision
    pub address_attempts: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            address_prefix: 0x0B10_0000_0000,
            name_prefix: "EmuDevice".into(),
            device_class: DeviceClass::new(MAJOR_COMPUTER),
            discoverable: DiscoverableMode::General,
            max_attributes_retrievable: 255,
            receive_mtu_max: L2CAP_MAX_MTU,
            max_concurrent_searches: 7,
            max_connected_devices: 7,
            inquiry_duration: Duration::from_secs(1),
            search_latency: Duration::ZERO,
            address_attempts: 64,
        }
    }
}

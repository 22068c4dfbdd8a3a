//! Virtual device registry
//!
//! An [`Ether`] stands in for the radio: it creates and releases
//! [`LocalDevice`]s, hands out unique addresses and answers reachability
//! queries for the transports and the discovery engine.

pub mod device;
pub mod handles;
pub mod registry;
#[cfg(test)]
mod tests;

pub use device::LocalDevice;
pub use handles::HandleTable;
pub use registry::Ether;

//! Service discovery records and the per-device service registry

pub mod record;
pub mod registry;
pub mod types;
#[cfg(test)]
mod tests;

pub use record::ServiceRecord;
pub use registry::ServiceRegistry;
pub use types::*;

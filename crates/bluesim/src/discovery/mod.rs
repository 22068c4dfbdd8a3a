//! Discovery engine: device inquiry and service search
//!
//! Both operations run on their own worker thread and report through a
//! [`DiscoveryListener`]. The call that starts them returns immediately.
//! Cancellation is cooperative and race-free: once a cancel has been
//! acknowledged, the only notification still delivered is the terminal one.

pub mod collector;
mod gate;
pub mod inquiry;
pub mod listener;
pub mod search;
#[cfg(test)]
mod tests;

pub use collector::{DiscoveryEvent, EventCollector};
pub use inquiry::InquiryState;
pub use listener::*;
pub use search::SearchRegistry;

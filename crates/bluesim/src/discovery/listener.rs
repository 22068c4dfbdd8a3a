use crate::gap::{DeviceClass, RemoteDevice};
use crate::sdp::ServiceRecord;

/// Identifies one service search. Never zero.
pub type TransactionId = u32;

/// Denotes "no active search"; never issued
pub const NO_TRANSACTION: TransactionId = 0;

/// Terminal code of an inquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InquiryCompletion {
    Completed,
    /// Cancelled by the listener that started it
    Terminated,
    Error,
    /// The local device was released while the inquiry ran
    NoLocalDevice,
}

impl InquiryCompletion {
    /// JSR-82 `DiscoveryListener` constant
    pub fn code(self) -> i32 {
        match self {
            InquiryCompletion::Completed => 0x00,
            InquiryCompletion::Terminated => 0x05,
            InquiryCompletion::Error => 0x07,
            InquiryCompletion::NoLocalDevice => 0x07,
        }
    }
}

/// Terminal code of a service search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchCompletion {
    Completed,
    Terminated,
    Error,
    DeviceNotReachable,
}

impl SearchCompletion {
    /// JSR-82 `DiscoveryListener` constant
    pub fn code(self) -> i32 {
        match self {
            SearchCompletion::Completed => 0x01,
            SearchCompletion::Terminated => 0x02,
            SearchCompletion::Error => 0x03,
            SearchCompletion::DeviceNotReachable => 0x06,
        }
    }
}

/// Receives the results of inquiries and service searches.
///
/// Every method is called from a worker thread, never from the thread that
/// started the operation. One worker delivers its own notifications in
/// order: any number of discoveries, then exactly one completion.
pub trait DiscoveryListener: Send + Sync {
    fn device_discovered(&self, _device: &RemoteDevice, _class: DeviceClass) {}

    fn inquiry_completed(&self, _completion: InquiryCompletion) {}

    fn services_discovered(&self, _transaction: TransactionId, _records: &[ServiceRecord]) {}

    fn service_search_completed(&self, _transaction: TransactionId, _completion: SearchCompletion) {}
}

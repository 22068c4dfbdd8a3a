//! A listener that turns notifications into a queue of events
//!
//! Useful wherever a caller wants to wait for a result instead of reacting to
//! callbacks. Every wait is bounded by a timeout.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::listener::{DiscoveryListener, InquiryCompletion, SearchCompletion, TransactionId};
use crate::gap::{DeviceClass, RemoteDevice};
use crate::sdp::ServiceRecord;
use crate::sync::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    DeviceDiscovered {
        device: RemoteDevice,
        class: DeviceClass,
    },
    InquiryCompleted(InquiryCompletion),
    ServicesDiscovered {
        transaction: TransactionId,
        records: Vec<ServiceRecord>,
    },
    SearchCompleted {
        transaction: TransactionId,
        completion: SearchCompletion,
    },
}

impl DiscoveryEvent {
    fn transaction(&self) -> Option<TransactionId> {
        match self {
            DiscoveryEvent::ServicesDiscovered { transaction, .. }
            | DiscoveryEvent::SearchCompleted { transaction, .. } => Some(*transaction),
            _ => None,
        }
    }
}

/// Collects every notification it receives, in delivery order
#[derive(Debug)]
pub struct EventCollector {
    sender: Mutex<Sender<DiscoveryEvent>>,
    receiver: Mutex<Receiver<DiscoveryEvent>>,
    /// Events skipped over by a targeted wait
    backlog: Mutex<VecDeque<DiscoveryEvent>>,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCollector {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender: Mutex::new(sender),
            receiver: Mutex::new(receiver),
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, event: DiscoveryEvent) {
        // The receiver lives as long as the collector
        let _ = lock(&self.sender).send(event);
    }

    fn next_matching(&self, deadline: Instant, wanted: impl Fn(&DiscoveryEvent) -> bool) -> Option<DiscoveryEvent> {
        {
            let mut backlog = lock(&self.backlog);
            if let Some(pos) = backlog.iter().position(&wanted) {
                return backlog.remove(pos);
            }
        }
        let receiver = lock(&self.receiver);
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match receiver.recv_timeout(remaining) {
                Ok(event) if wanted(&event) => return Some(event),
                Ok(event) => lock(&self.backlog).push_back(event),
                Err(_) => return None,
            }
        }
    }

    /// The next event of any kind
    pub fn next_event(&self, timeout: Duration) -> Option<DiscoveryEvent> {
        self.next_matching(Instant::now() + timeout, |_| true)
    }

    /// Waits for the end of an inquiry. Returns the devices found and the
    /// completion code, or `None` on timeout.
    pub fn wait_inquiry(&self, timeout: Duration) -> Option<(Vec<(RemoteDevice, DeviceClass)>, InquiryCompletion)> {
        let deadline = Instant::now() + timeout;
        let mut devices = Vec::new();
        loop {
            let event = self.next_matching(deadline, |event| {
                matches!(
                    event,
                    DiscoveryEvent::DeviceDiscovered { .. } | DiscoveryEvent::InquiryCompleted(_)
                )
            })?;
            match event {
                DiscoveryEvent::DeviceDiscovered { device, class } => devices.push((device, class)),
                DiscoveryEvent::InquiryCompleted(completion) => return Some((devices, completion)),
                _ => {}
            }
        }
    }

    /// Waits for the end of search `transaction`. Returns every record it
    /// delivered and the completion code, or `None` on timeout.
    pub fn wait_search(
        &self,
        transaction: TransactionId,
        timeout: Duration,
    ) -> Option<(Vec<ServiceRecord>, SearchCompletion)> {
        let deadline = Instant::now() + timeout;
        let mut found = Vec::new();
        loop {
            match self.next_matching(deadline, |event| event.transaction() == Some(transaction))? {
                DiscoveryEvent::ServicesDiscovered { records, .. } => found.extend(records),
                DiscoveryEvent::SearchCompleted { completion, .. } => return Some((found, completion)),
                _ => {}
            }
        }
    }

    /// Every event received so far, without waiting
    pub fn drain(&self) -> Vec<DiscoveryEvent> {
        let mut events: Vec<_> = lock(&self.backlog).drain(..).collect();
        events.extend(lock(&self.receiver).try_iter());
        events
    }
}

impl DiscoveryListener for EventCollector {
    fn device_discovered(&self, device: &RemoteDevice, class: DeviceClass) {
        self.push(DiscoveryEvent::DeviceDiscovered {
            device: device.clone(),
            class,
        });
    }

    fn inquiry_completed(&self, completion: InquiryCompletion) {
        self.push(DiscoveryEvent::InquiryCompleted(completion));
    }

    fn services_discovered(&self, transaction: TransactionId, records: &[ServiceRecord]) {
        self.push(DiscoveryEvent::ServicesDiscovered {
            transaction,
            records: records.to_vec(),
        });
    }

    fn service_search_completed(&self, transaction: TransactionId, completion: SearchCompletion) {
        self.push(DiscoveryEvent::SearchCompleted {
            transaction,
            completion,
        });
    }
}

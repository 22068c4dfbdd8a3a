//! Service search transactions
//!
//! Every search runs on its own worker and is tracked in the ether-wide
//! [`SearchRegistry`] under a non-zero transaction ID until its terminal
//! notification has been delivered.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use super::gate::{DeliveryGate, Outcome};
use super::listener::{DiscoveryListener, SearchCompletion, TransactionId, NO_TRANSACTION};
use crate::error::{Error, Result};
use crate::ether::{Ether, LocalDevice};
use crate::gap::{BdAddr, RemoteDevice};
use crate::sdp::ServiceRecord;
use crate::sync::lock;
use crate::transport::SecurityLevel;
use crate::uuid::Uuid;

pub(crate) struct SearchTransaction {
    id: TransactionId,
    origin: BdAddr,
    target: RemoteDevice,
    /// Resolved when the search started; `None` if the target was unknown
    target_device: Option<Arc<LocalDevice>>,
    uuids: Vec<Uuid>,
    attr_ids: Vec<u16>,
    listener: Arc<dyn DiscoveryListener>,
    gate: DeliveryGate,
}

impl fmt::Debug for SearchTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchTransaction")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("target", &self.target.address())
            .field("uuids", &self.uuids)
            .field("attr_ids", &self.attr_ids)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl SearchTransaction {
    fn involves(&self, address: BdAddr) -> bool {
        self.origin == address || self.target.address() == address
    }
}

#[derive(Debug)]
struct RegistryState {
    next_id: TransactionId,
    active: HashMap<TransactionId, Arc<SearchTransaction>>,
}

/// Process-wide table of running service searches
#[derive(Debug)]
pub struct SearchRegistry {
    state: Mutex<RegistryState>,
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                next_id: 1,
                active: HashMap::new(),
            }),
        }
    }

    /// Issues an ID and stores the transaction built for it. Fails when
    /// `origin` already has `max_per_device` searches running.
    fn register(
        &self,
        origin: BdAddr,
        max_per_device: usize,
        build: impl FnOnce(TransactionId) -> SearchTransaction,
    ) -> Result<Arc<SearchTransaction>> {
        let mut state = lock(&self.state);
        let running = state.active.values().filter(|t| t.origin == origin).count();
        if running >= max_per_device {
            return Err(Error::StateError(format!(
                "{} service searches already running",
                running
            )));
        }

        let mut id = state.next_id;
        while id == NO_TRANSACTION || state.active.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        state.next_id = id.wrapping_add(1);

        let transaction = Arc::new(build(id));
        state.active.insert(id, Arc::clone(&transaction));
        Ok(transaction)
    }

    fn remove(&self, id: TransactionId) {
        lock(&self.state).active.remove(&id);
    }

    fn get(&self, id: TransactionId) -> Option<Arc<SearchTransaction>> {
        lock(&self.state).active.get(&id).cloned()
    }

    /// Cancels `id` unless it is unknown or its terminal notification has
    /// already started
    pub fn cancel(&self, id: TransactionId) -> bool {
        let Some(transaction) = self.get(id) else {
            return false;
        };
        let cancelled = transaction.gate.cancel();
        if cancelled {
            info!("{}: service search {} cancelled", transaction.origin, id);
        }
        cancelled
    }

    /// Whether `id` has not yet delivered its terminal notification
    pub fn is_active(&self, id: TransactionId) -> bool {
        lock(&self.state).active.contains_key(&id)
    }

    /// Running searches started by `origin`
    pub fn running_for(&self, origin: BdAddr) -> usize {
        lock(&self.state)
            .active
            .values()
            .filter(|t| t.origin == origin)
            .count()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).active.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).active.is_empty()
    }

    /// Aborts every search started by or aimed at `address`
    pub(crate) fn abort_device(&self, address: BdAddr) {
        let affected: Vec<_> = lock(&self.state)
            .active
            .values()
            .filter(|t| t.involves(address))
            .cloned()
            .collect();
        for transaction in affected {
            if transaction.gate.abort() {
                debug!("service search {} aborted, {} went away", transaction.id, address);
            }
        }
    }
}

/// Starts a search of `remote` for records advertising any of `uuids`.
///
/// Only synchronous validation fails here. An unknown remote device still
/// gets a transaction, whose only notification is `DeviceNotReachable`.
pub(crate) fn start(
    ether: &Arc<Ether>,
    device: &LocalDevice,
    attr_ids: &[u16],
    uuids: &[Uuid],
    remote: &RemoteDevice,
    listener: Arc<dyn DiscoveryListener>,
) -> Result<TransactionId> {
    device.ensure_active()?;
    if uuids.is_empty() {
        return Err(Error::InvalidParameter("UUID set is empty".into()));
    }
    if attr_ids.len() > device.max_attributes_retrievable() {
        return Err(Error::InvalidParameter(format!(
            "{} attribute IDs requested, at most {} allowed",
            attr_ids.len(),
            device.max_attributes_retrievable()
        )));
    }

    let target_device = ether.reachable(remote.address()).ok();
    let transaction = ether.searches().register(
        device.address(),
        device.config().max_concurrent_searches,
        |id| SearchTransaction {
            id,
            origin: device.address(),
            target: remote.clone(),
            target_device,
            uuids: uuids.to_vec(),
            attr_ids: attr_ids.to_vec(),
            listener,
            gate: DeliveryGate::new(),
        },
    )?;
    let id = transaction.id;

    let spawned = thread::Builder::new().name(format!("sdp-search-{}", id)).spawn({
        let ether = Arc::clone(ether);
        let latency = device.config().search_latency;
        move || run_search(&ether, &transaction, latency)
    });
    if let Err(e) = spawned {
        ether.searches().remove(id);
        return Err(Error::StateError(format!("cannot start service search: {}", e)));
    }

    info!(
        "{}: service search {} of {} for {:?}",
        device.address(),
        id,
        remote.address(),
        uuids
    );
    Ok(id)
}

fn run_search(ether: &Ether, transaction: &SearchTransaction, latency: Duration) {
    transaction.gate.bind_worker();
    let result = panic::catch_unwind(AssertUnwindSafe(|| discover(transaction, latency)));

    let completion = match (transaction.gate.finish(), result) {
        (Outcome::Cancelled, _) => SearchCompletion::Terminated,
        (Outcome::Aborted, _) => SearchCompletion::DeviceNotReachable,
        (Outcome::Completed, Ok(Ok(()))) => SearchCompletion::Completed,
        (Outcome::Completed, Ok(Err(Error::DeviceUnreachable(_)))) => SearchCompletion::DeviceNotReachable,
        (Outcome::Completed, Ok(Err(e))) => {
            warn!("service search {} failed: {}", transaction.id, e);
            SearchCompletion::Error
        }
        (Outcome::Completed, Err(_)) => {
            warn!("service search {}: listener panicked", transaction.id);
            SearchCompletion::Error
        }
    };

    debug!("service search {} finished with {:?}", transaction.id, completion);
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
        transaction
            .listener
            .service_search_completed(transaction.id, completion)
    }));
    if delivered.is_err() {
        warn!("service search {}: service_search_completed listener panicked", transaction.id);
    }
    ether.searches().remove(transaction.id);
}

fn discover(transaction: &SearchTransaction, latency: Duration) -> Result<()> {
    if !transaction.gate.sleep(latency) {
        return Ok(());
    }

    let target = transaction.target.address();
    let remote = transaction
        .target_device
        .as_ref()
        .filter(|device| device.is_active())
        .ok_or(Error::DeviceUnreachable(target))?;

    let records: Vec<ServiceRecord> = remote
        .services()
        .search(&transaction.uuids)
        .iter()
        .map(|record| record.retrieve(&transaction.attr_ids))
        .collect();
    if !records.is_empty() {
        transaction.gate.deliver(|| {
            for record in &records {
                if let Some(url) = record.connection_url(SecurityLevel::NoAuthenticateNoEncrypt, false) {
                    debug!("service search {}: found {}", transaction.id, url);
                }
            }
            transaction.listener.services_discovered(transaction.id, &records)
        });
    }
    Ok(())
}

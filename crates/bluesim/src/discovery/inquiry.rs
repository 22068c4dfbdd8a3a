//! Device inquiry
//!
//! At most one inquiry runs per local device. The worker reports every
//! device in the ether that answers the access code, in address order,
//! then keeps the inquiry open for the configured duration before
//! delivering the single `inquiry_completed` notification.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use super::gate::{DeliveryGate, Outcome};
use super::listener::{DiscoveryListener, InquiryCompletion};
use crate::error::{Error, Result};
use crate::ether::{Ether, LocalDevice};
use crate::gap::{IAC_MAX, IAC_MIN};
use crate::sync::lock;

/// Observable state of a device's inquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InquiryState {
    /// No inquiry has run yet
    Idle,
    Running,
    /// The last run was cancelled or aborted, or is stopping
    Cancelled,
    /// The last run ran to completion
    Completed,
}

pub(crate) struct InquiryRun {
    access_code: u32,
    listener: Arc<dyn DiscoveryListener>,
    gate: DeliveryGate,
}

impl fmt::Debug for InquiryRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InquiryRun")
            .field("access_code", &format_args!("0x{:06X}", self.access_code))
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// The inquiry slot of one local device
#[derive(Debug, Default)]
pub(crate) struct InquirySlot {
    current: Option<Arc<InquiryRun>>,
    last: Option<InquiryState>,
}

impl InquirySlot {
    pub(crate) fn state(&self) -> InquiryState {
        match &self.current {
            Some(run) if run.gate.is_stopped() => InquiryState::Cancelled,
            Some(_) => InquiryState::Running,
            None => self.last.unwrap_or(InquiryState::Idle),
        }
    }
}

fn same_listener<L: DiscoveryListener + ?Sized>(run: &InquiryRun, listener: &Arc<L>) -> bool {
    Arc::as_ptr(&run.listener).cast::<()>() == Arc::as_ptr(listener).cast::<()>()
}

/// Starts an inquiry on `device`. Returns as soon as the worker is running.
pub(crate) fn start(
    ether: &Arc<Ether>,
    device: &Arc<LocalDevice>,
    access_code: u32,
    listener: Arc<dyn DiscoveryListener>,
) -> Result<()> {
    if !(IAC_MIN..=IAC_MAX).contains(&access_code) {
        return Err(Error::InvalidParameter(format!(
            "invalid inquiry access code 0x{:06X}",
            access_code
        )));
    }
    device.ensure_active()?;

    let run = {
        let mut slot = lock(device.inquiry_slot());
        if slot.current.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let run = Arc::new(InquiryRun {
            access_code,
            listener,
            gate: DeliveryGate::new(),
        });
        slot.current = Some(Arc::clone(&run));
        run
    };

    let spawned = thread::Builder::new()
        .name(format!("inquiry-{}", device.address().to_bluetooth_string()))
        .spawn({
            let ether = Arc::clone(ether);
            let device = Arc::clone(device);
            let run = Arc::clone(&run);
            move || run_inquiry(&ether, &device, &run)
        });
    if let Err(e) = spawned {
        lock(device.inquiry_slot()).current = None;
        return Err(Error::StateError(format!("cannot start inquiry: {}", e)));
    }

    info!("{}: inquiry started (access code 0x{:06X})", device.address(), access_code);
    Ok(())
}

/// Cancels the running inquiry if `listener` is the one that started it
pub(crate) fn cancel<L: DiscoveryListener + ?Sized>(device: &LocalDevice, listener: &Arc<L>) -> bool {
    let run = {
        let slot = lock(device.inquiry_slot());
        match &slot.current {
            Some(run) if same_listener(run, listener) => Arc::clone(run),
            _ => return false,
        }
    };
    let cancelled = run.gate.cancel();
    if cancelled {
        info!("{}: inquiry cancelled", device.address());
    }
    cancelled
}

/// Stops the running inquiry because `device` is going away
pub(crate) fn abort(device: &LocalDevice) {
    let run = lock(device.inquiry_slot()).current.clone();
    if let Some(run) = run {
        if run.gate.abort() {
            debug!("{}: inquiry aborted", device.address());
        }
    }
}

fn run_inquiry(ether: &Ether, device: &LocalDevice, run: &Arc<InquiryRun>) {
    run.gate.bind_worker();

    let discovered = panic::catch_unwind(AssertUnwindSafe(|| {
        let candidates = ether.inquiry_candidates(device.address(), run.access_code);
        let mut count = 0usize;
        for (remote, class) in &candidates {
            if !run.gate.deliver(|| run.listener.device_discovered(remote, *class)) {
                break;
            }
            debug!("{}: discovered {} (class 0x{:06X})", device.address(), remote.address(), class.raw());
            count += 1;
        }
        run.gate.sleep(device.config().inquiry_duration);
        count
    }));

    let completion = match (run.gate.finish(), discovered) {
        (Outcome::Cancelled, _) => InquiryCompletion::Terminated,
        (Outcome::Aborted, _) => InquiryCompletion::NoLocalDevice,
        (Outcome::Completed, Ok(count)) => {
            info!("{}: inquiry completed, {} device(s) found", device.address(), count);
            InquiryCompletion::Completed
        }
        (Outcome::Completed, Err(_)) => {
            warn!("{}: inquiry listener panicked", device.address());
            InquiryCompletion::Error
        }
    };

    {
        let mut slot = lock(device.inquiry_slot());
        if slot.current.as_ref().is_some_and(|current| Arc::ptr_eq(current, run)) {
            slot.current = None;
            slot.last = Some(match completion {
                InquiryCompletion::Completed => InquiryState::Completed,
                _ => InquiryState::Cancelled,
            });
        }
    }

    debug!("{}: inquiry finished with {:?}", device.address(), completion);
    if panic::catch_unwind(AssertUnwindSafe(|| run.listener.inquiry_completed(completion))).is_err() {
        warn!("{}: inquiry_completed listener panicked", device.address());
    }
}

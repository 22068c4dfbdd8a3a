//! The simulated ether: every local device that is currently alive

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use log::{debug, info};
use rand::Rng;

use super::device::LocalDevice;
use crate::config::EmulatorConfig;
use crate::discovery::inquiry;
use crate::discovery::search::SearchRegistry;
use crate::error::{Error, Result};
use crate::gap::{BdAddr, DeviceClass, RemoteDevice};
use crate::sync::{read, write};

const ADDRESS_PREFIX_MASK: u64 = 0xFFFF_FF00_0000;
const ADDRESS_SUFFIX_MAX: u64 = 0x00_FFFF_FF;

/// Registry of live local devices.
///
/// Addresses are unique among live devices. Devices see each other only
/// through the ether they were created in, and every service search started
/// by one of them is tracked in the ether's [`SearchRegistry`].
#[derive(Debug)]
pub struct Ether {
    config: EmulatorConfig,
    devices: RwLock<BTreeMap<BdAddr, Arc<LocalDevice>>>,
    searches: SearchRegistry,
}

impl Ether {
    pub fn new(config: EmulatorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            devices: RwLock::new(BTreeMap::new()),
            searches: SearchRegistry::new(),
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn searches(&self) -> &SearchRegistry {
        &self.searches
    }

    /// Creates a device with a fresh random address under the configured prefix
    pub fn create_local_device(&self) -> Result<Arc<LocalDevice>> {
        let mut rng = rand::thread_rng();
        let mut devices = write(&self.devices);
        for _ in 0..self.config.address_attempts {
            let suffix = rng.gen_range(1..=ADDRESS_SUFFIX_MAX);
            let address = BdAddr::from_u64((self.config.address_prefix & ADDRESS_PREFIX_MASK) | suffix);
            if devices.contains_key(&address) {
                debug!("address {} already in use, retrying", address);
                continue;
            }

            let device = Arc::new(LocalDevice::new(address, &self.config));
            devices.insert(address, Arc::clone(&device));
            info!("created local device {} '{}'", address, device.name());
            return Ok(device);
        }
        Err(Error::ResourceLimitReached)
    }

    /// Removes `device` from the ether.
    ///
    /// Its inquiry and every search it started or targets are aborted, and
    /// all of its handles are closed. Releasing twice is a no-op.
    pub fn release_local_device(&self, device: &LocalDevice) {
        if !device.mark_released() {
            return;
        }
        let address = device.address();
        write(&self.devices).remove(&address);

        inquiry::abort(device);
        self.searches.abort_device(address);
        device.close_all();
        info!("released local device {}", address);
    }

    pub fn device(&self, address: BdAddr) -> Option<Arc<LocalDevice>> {
        read(&self.devices).get(&address).cloned()
    }

    /// The device at `address`, if it is present and powered
    pub fn reachable(&self, address: BdAddr) -> Result<Arc<LocalDevice>> {
        self.device(address)
            .filter(|device| device.is_active())
            .ok_or(Error::DeviceUnreachable(address))
    }

    /// Devices that answer an inquiry from `origin` with `access_code`,
    /// in address order
    pub fn inquiry_candidates(&self, origin: BdAddr, access_code: u32) -> Vec<(RemoteDevice, DeviceClass)> {
        read(&self.devices)
            .values()
            .filter(|device| device.address() != origin)
            .filter(|device| device.is_active() && device.discoverable().responds_to(access_code))
            .map(|device| {
                (
                    RemoteDevice::with_name(device.address(), device.name()),
                    device.device_class(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.devices).is_empty()
    }
}

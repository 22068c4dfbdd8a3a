//! Protocol/Service Multiplexer (PSM) and RFCOMM channel allocation
//!
//! Each local device owns one [`ChannelAllocator`]; channel numbers and PSMs
//! are unique per device, never across the ether.

use std::collections::BTreeSet;

use super::types::Protocol;
use super::{RFCOMM_CHANNEL_MAX, RFCOMM_CHANNEL_MIN};
use crate::error::{Error, Result};

// Fixed PSM values for standard protocols
pub const PSM_SDP: u16 = 0x0001;
pub const PSM_RFCOMM: u16 = 0x0003;
pub const PSM_BNEP: u16 = 0x000F;
pub const PSM_HID_CONTROL: u16 = 0x0011;
pub const PSM_HID_INTERRUPT: u16 = 0x0013;
pub const PSM_AVCTP: u16 = 0x0017;
pub const PSM_AVDTP: u16 = 0x0019;

/// First dynamically assignable PSM
pub const PSM_DYNAMIC_MIN: u16 = 0x1001;
const PSM_DYNAMIC_MAX: u16 = 0xFEFF;

/// A PSM is valid when its least significant octet is odd and its most
/// significant octet is even.
pub fn is_valid_psm(value: u16) -> bool {
    value & 0x0001 == 1 && value & 0x0100 == 0
}

/// Next valid dynamic PSM after `value`, wrapping back to the start of the range.
fn next_dynamic(value: u16) -> u16 {
    let mut candidate = value;
    loop {
        candidate = if candidate >= PSM_DYNAMIC_MAX {
            PSM_DYNAMIC_MIN
        } else {
            candidate + 2
        };
        if is_valid_psm(candidate) {
            return candidate;
        }
    }
}

/// Tracks RFCOMM channels and PSMs held by open servers of one device
#[derive(Debug)]
pub struct ChannelAllocator {
    rfcomm: BTreeSet<u8>,
    psms: BTreeSet<u16>,
    next_psm: u16,
}

impl Default for ChannelAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelAllocator {
    pub fn new() -> Self {
        Self {
            rfcomm: BTreeSet::new(),
            psms: BTreeSet::new(),
            next_psm: PSM_DYNAMIC_MIN,
        }
    }

    /// Lowest free RFCOMM channel
    pub fn allocate_rfcomm(&mut self) -> Result<u8> {
        let channel = (RFCOMM_CHANNEL_MIN..=RFCOMM_CHANNEL_MAX)
            .find(|channel| !self.rfcomm.contains(channel))
            .ok_or(Error::ResourceLimitReached)?;
        self.rfcomm.insert(channel);
        Ok(channel)
    }

    /// Reserves `requested`, or the next free dynamic PSM when `None`
    pub fn allocate_psm(&mut self, requested: Option<u16>) -> Result<u16> {
        if let Some(psm) = requested {
            if !is_valid_psm(psm) || psm == PSM_SDP || psm == PSM_RFCOMM {
                return Err(Error::InvalidParameter(format!("invalid PSM 0x{:04X}", psm)));
            }
            if !self.psms.insert(psm) {
                return Err(Error::InvalidParameter(format!("PSM 0x{:04X} already in use", psm)));
            }
            return Ok(psm);
        }

        let start = self.next_psm;
        let mut candidate = start;
        loop {
            if !self.psms.contains(&candidate) {
                self.psms.insert(candidate);
                self.next_psm = next_dynamic(candidate);
                return Ok(candidate);
            }
            candidate = next_dynamic(candidate);
            if candidate == start {
                return Err(Error::ResourceLimitReached);
            }
        }
    }

    pub fn release(&mut self, protocol: Protocol, value: u16) {
        match protocol {
            Protocol::Rfcomm => {
                if let Ok(channel) = u8::try_from(value) {
                    self.rfcomm.remove(&channel);
                }
            }
            Protocol::L2cap => {
                self.psms.remove(&value);
            }
        }
    }

    pub fn in_use(&self, protocol: Protocol, value: u16) -> bool {
        match protocol {
            Protocol::Rfcomm => u8::try_from(value).map_or(false, |c| self.rfcomm.contains(&c)),
            Protocol::L2cap => self.psms.contains(&value),
        }
    }
}

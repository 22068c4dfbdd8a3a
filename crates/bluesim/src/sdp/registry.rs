//! Per-device registry of advertised service records

use std::collections::BTreeMap;
use std::sync::RwLock;

use log::debug;

use super::record::ServiceRecord;
use super::types::AttributeId;
use crate::error::{Error, Result};
use crate::sync::{read, write};
use crate::uuid::Uuid;

/// Service records of one local device, keyed by record handle
#[derive(Debug)]
pub struct ServiceRegistry {
    records: RwLock<BTreeMap<u32, ServiceRecord>>,
    max_attributes: usize,
}

impl ServiceRegistry {
    pub fn new(max_attributes: usize) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            max_attributes,
        }
    }

    fn check_size(&self, record: &ServiceRecord) -> Result<()> {
        if record.len() > self.max_attributes {
            return Err(Error::InvalidParameter(format!(
                "record has {} attributes, at most {} allowed",
                record.len(),
                self.max_attributes
            )));
        }
        Ok(())
    }

    /// Advertises `record`, replacing any record with the same handle
    pub fn register(&self, record: ServiceRecord) -> Result<()> {
        self.check_size(&record)?;
        debug!("{}: registered service record 0x{:08X}", record.host(), record.handle());
        write(&self.records).insert(record.handle(), record);
        Ok(())
    }

    /// Replaces the attributes of an advertised record. The record handle and
    /// protocol descriptor list of the registered record are kept.
    pub fn update(&self, record: &ServiceRecord) -> Result<ServiceRecord> {
        let mut records = write(&self.records);
        let current = records.get(&record.handle()).ok_or_else(|| {
            Error::ServiceRegistration(format!("record 0x{:08X} is not registered", record.handle()))
        })?;

        let mut updated = record.clone();
        for id in [AttributeId::ServiceRecordHandle, AttributeId::ProtocolDescriptorList] {
            updated.set_attribute(id.value(), current.attribute(id.value()).cloned());
        }
        self.check_size(&updated)?;

        records.insert(updated.handle(), updated.clone());
        debug!("{}: updated service record 0x{:08X}", updated.host(), updated.handle());
        Ok(updated)
    }

    pub fn unregister(&self, handle: u32) -> Option<ServiceRecord> {
        write(&self.records).remove(&handle)
    }

    pub fn get(&self, handle: u32) -> Option<ServiceRecord> {
        read(&self.records).get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        read(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.records).is_empty()
    }

    /// Records advertising at least one of `uuids`, in handle order
    pub fn search(&self, uuids: &[Uuid]) -> Vec<ServiceRecord> {
        read(&self.records)
            .values()
            .filter(|record| record.advertises_any(uuids))
            .cloned()
            .collect()
    }

    /// Copies the values of `ids` from the registered record into `record`.
    ///
    /// Fails with `InvalidParameter` when more than `max` IDs are requested
    /// and with `NotFound` when the record is no longer advertised; `record`
    /// is left untouched in both cases. Returns whether any of the requested
    /// attributes exists.
    pub fn populate_attributes(&self, record: &mut ServiceRecord, ids: &[u16], max: usize) -> Result<bool> {
        if ids.len() > max {
            return Err(Error::InvalidParameter(format!(
                "{} attribute IDs requested, at most {} allowed",
                ids.len(),
                max
            )));
        }

        let found: Vec<_> = {
            let records = read(&self.records);
            let source = records.get(&record.handle()).ok_or(Error::NotFound)?;
            ids.iter()
                .filter_map(|id| source.attribute(*id).map(|value| (*id, value.clone())))
                .collect()
        };

        let any = !found.is_empty();
        for (id, value) in found {
            record.set_attribute(id, Some(value));
        }
        Ok(any)
    }
}

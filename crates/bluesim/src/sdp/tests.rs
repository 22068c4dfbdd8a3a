//! Tests for service records and the service registry

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::Error;
    use crate::gap::BdAddr;
    use crate::transport::SecurityLevel;
    use crate::uuid::Uuid;

    fn host() -> BdAddr {
        "0B1000A1B2C3".parse().unwrap()
    }

    fn rfcomm_record(handle: u32, uuid: Uuid, obex: bool) -> ServiceRecord {
        let mut record = ServiceRecord::new(host(), handle);
        record.populate_rfcomm_attributes(handle, 3, uuid, "Object Push", obex);
        record
    }

    #[test]
    fn test_rfcomm_record_layout() {
        let record = rfcomm_record(7, Uuid::OBEX_OBJECT_PUSH, true);

        assert_eq!(record.handle(), 7);
        assert_eq!(record.attribute_ids(), vec![0x0000, 0x0001, 0x0004, 0x0005, 0x0100]);
        assert_eq!(record.attribute(0x0000), Some(&DataElement::Unsigned32(7)));
        assert_eq!(record.rfcomm_channel(), Some(3));
        assert_eq!(record.l2cap_psm(), None);
        assert!(record.is_obex());
        assert_eq!(record.service_name(), Some("Object Push"));

        let uuids = record.service_uuids();
        assert!(uuids.contains(&Uuid::OBEX_OBJECT_PUSH));
        assert!(uuids.contains(&Uuid::RFCOMM));
        assert!(uuids.contains(&Uuid::PUBLIC_BROWSE_ROOT));
    }

    #[test]
    fn test_l2cap_record_layout() {
        let mut record = ServiceRecord::new(host(), 2);
        record.populate_l2cap_attributes(2, 0x1001, Uuid::from_u16(0x1124), "");

        assert_eq!(record.l2cap_psm(), Some(0x1001));
        assert_eq!(record.rfcomm_channel(), None);
        assert!(!record.is_obex());
        // Empty names are not advertised
        assert_eq!(record.service_name(), None);
    }

    #[test]
    fn test_connection_urls() {
        let spp = rfcomm_record(1, Uuid::SERIAL_PORT, false);
        assert_eq!(
            spp.connection_url(SecurityLevel::NoAuthenticateNoEncrypt, false).unwrap(),
            "btspp://0B1000A1B2C3:3;authenticate=false;encrypt=false;master=false"
        );

        let goep = rfcomm_record(1, Uuid::OBEX_OBJECT_PUSH, true);
        assert!(goep
            .connection_url(SecurityLevel::AuthenticateEncrypt, false)
            .unwrap()
            .starts_with("btgoep://0B1000A1B2C3:3;authenticate=true;encrypt=true"));

        let mut l2cap = ServiceRecord::new(host(), 1);
        l2cap.populate_l2cap_attributes(1, 0x1003, Uuid::from_u16(0x1124), "HID");
        assert!(l2cap
            .connection_url(SecurityLevel::NoAuthenticateNoEncrypt, true)
            .unwrap()
            .starts_with("btl2cap://0B1000A1B2C3:1003;"));

        assert_eq!(
            ServiceRecord::new(host(), 1).connection_url(SecurityLevel::NoAuthenticateNoEncrypt, false),
            None
        );
    }

    #[test]
    fn test_retrieve_keeps_default_attributes() {
        let record = rfcomm_record(1, Uuid::SERIAL_PORT, false);

        let minimal = record.retrieve(&[]);
        assert_eq!(minimal.attribute_ids(), vec![0x0000, 0x0001, 0x0004]);

        let named = record.retrieve(&[0x0100, 0x0200]);
        assert_eq!(named.attribute_ids(), vec![0x0000, 0x0001, 0x0004, 0x0100]);
        assert_eq!(named.handle(), record.handle());
        assert_eq!(named.host(), record.host());
    }

    #[test]
    fn test_registry_search() {
        let registry = ServiceRegistry::new(255);
        registry.register(rfcomm_record(1, Uuid::SERIAL_PORT, false)).unwrap();
        registry.register(rfcomm_record(2, Uuid::OBEX_OBJECT_PUSH, true)).unwrap();
        assert_eq!(registry.len(), 2);

        let found = registry.search(&[Uuid::OBEX_OBJECT_PUSH]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].handle(), 2);

        // One matching UUID of the set is enough
        let found = registry.search(&[Uuid::from_u16(0xBEEF), Uuid::SERIAL_PORT]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].handle(), 1);

        // Every record carries the RFCOMM protocol UUID
        assert_eq!(registry.search(&[Uuid::RFCOMM]).len(), 2);
        assert!(registry.search(&[Uuid::OBEX_FILE_TRANSFER]).is_empty());

        assert!(registry.unregister(1).is_some());
        assert!(registry.unregister(1).is_none());
        assert!(registry.search(&[Uuid::SERIAL_PORT]).is_empty());
    }

    #[test]
    fn test_register_respects_attribute_bound() {
        let registry = ServiceRegistry::new(3);
        let result = registry.register(rfcomm_record(1, Uuid::SERIAL_PORT, false));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_preserves_protocol_descriptor() {
        let registry = ServiceRegistry::new(255);
        registry.register(rfcomm_record(1, Uuid::SERIAL_PORT, false)).unwrap();

        let mut changed = registry.get(1).unwrap();
        changed.set_attribute(0x0100, Some(DataElement::TextString("Renamed".into())));
        changed.set_attribute(0x0004, None);
        changed.set_attribute(0x0000, Some(DataElement::Unsigned32(99)));

        let updated = registry.update(&changed).unwrap();
        assert_eq!(updated.service_name(), Some("Renamed"));
        assert_eq!(updated.rfcomm_channel(), Some(3));
        assert_eq!(updated.attribute(0x0000), Some(&DataElement::Unsigned32(1)));
        assert_eq!(registry.get(1).unwrap(), updated);
    }

    #[test]
    fn test_update_unknown_record() {
        let registry = ServiceRegistry::new(255);
        let result = registry.update(&rfcomm_record(5, Uuid::SERIAL_PORT, false));
        assert!(matches!(result, Err(Error::ServiceRegistration(_))));
    }

    #[test]
    fn test_populate_attributes() {
        let registry = ServiceRegistry::new(255);
        let full = rfcomm_record(1, Uuid::SERIAL_PORT, false);
        registry.register(full.clone()).unwrap();

        let mut record = full.retrieve(&[]);
        assert_eq!(record.service_name(), None);

        assert!(registry.populate_attributes(&mut record, &[0x0100, 0x0005], 255).unwrap());
        assert_eq!(record.service_name(), Some("Object Push"));
        assert!(record.attribute(0x0005).is_some());

        // Nothing requested exists
        assert!(!registry.populate_attributes(&mut record, &[0x0200], 255).unwrap());
    }

    #[test]
    fn test_populate_attributes_over_limit_leaves_record_untouched() {
        let registry = ServiceRegistry::new(255);
        let full = rfcomm_record(1, Uuid::SERIAL_PORT, false);
        registry.register(full.clone()).unwrap();

        let mut record = full.retrieve(&[]);
        let before = record.clone();
        let ids: Vec<u16> = (0x0100..0x0104).collect();

        let result = registry.populate_attributes(&mut record, &ids, 3);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert_eq!(record, before);
    }

    #[test]
    fn test_populate_attributes_unregistered_record() {
        let registry = ServiceRegistry::new(255);
        let mut record = rfcomm_record(9, Uuid::SERIAL_PORT, false);
        let before = record.clone();
        assert_eq!(registry.populate_attributes(&mut record, &[0x0100], 255), Err(Error::NotFound));
        assert_eq!(record, before);
    }

    #[test]
    fn test_data_element_uuid_search() {
        let element = DataElement::Sequence(vec![
            DataElement::Unsigned8(1),
            DataElement::Alternative(vec![DataElement::Uuid(Uuid::OBEX)]),
        ]);
        assert!(element.contains_uuid(Uuid::OBEX));
        assert!(!element.contains_uuid(Uuid::RFCOMM));

        let mut uuids = Vec::new();
        element.collect_uuids(&mut uuids);
        assert_eq!(uuids, vec![Uuid::OBEX]);
    }
}

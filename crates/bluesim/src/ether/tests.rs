//! Tests for the device registry, local devices and handle tables

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::EmulatorConfig;
    use crate::error::Error;
    use crate::gap::{BdAddr, DiscoverableMode, ServiceClasses, GIAC, LIAC, MAJOR_PHONE, NOT_DISCOVERABLE};
    use crate::transport::{Connection, ConnectionKind, Protocol, Role, ServerParams};
    use crate::uuid::Uuid;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ether() -> Arc<Ether> {
        Ether::new(EmulatorConfig::default())
    }

    fn open_server(device: &LocalDevice) -> (u32, Connection) {
        let (handle, _) = crate::transport::rfcomm::open_server(device, &ServerParams::new(Uuid::SERIAL_PORT, "SPP"))
            .unwrap();
        (handle, device.connections().get(handle).unwrap())
    }

    #[test]
    fn test_create_unique_devices() {
        let ether = ether();
        let devices: Vec<_> = (0..32).map(|_| ether.create_local_device().unwrap()).collect();
        assert_eq!(ether.len(), 32);

        let addresses: HashSet<BdAddr> = devices.iter().map(|d| d.address()).collect();
        assert_eq!(addresses.len(), 32);
        for device in &devices {
            assert_eq!(device.address().to_u64() >> 24, 0x0B10_00);
            assert!(device.name().starts_with("EmuDevice-"));
            assert!(device.is_active());
            assert!(Arc::ptr_eq(&ether.device(device.address()).unwrap(), device));
        }
    }

    #[test]
    fn test_address_space_exhaustion() {
        let ether = Ether::new(EmulatorConfig {
            address_attempts: 0,
            ..EmulatorConfig::default()
        });
        assert_eq!(ether.create_local_device().unwrap_err(), Error::ResourceLimitReached);
        assert!(ether.is_empty());
    }

    #[test]
    fn test_release_device() {
        let ether = ether();
        let device = ether.create_local_device().unwrap();
        let address = device.address();
        let (handle, server) = open_server(&device);

        ether.release_local_device(&device);
        assert!(device.is_released());
        assert!(ether.device(address).is_none());
        assert_eq!(ether.reachable(address).unwrap_err(), Error::DeviceUnreachable(address));

        // Handles and records are gone
        assert!(device.connections().is_empty());
        assert!(device.services().is_empty());
        assert_eq!(device.connection(handle).unwrap_err(), Error::ConnectionClosed);
        if let Connection::RfcommServer(service) = server {
            assert!(service.is_closed());
        }
        assert!(matches!(device.ensure_active(), Err(Error::StateError(_))));

        // Releasing twice is harmless
        ether.release_local_device(&device);
    }

    #[test]
    fn test_powered_off_device_is_unreachable() {
        let ether = ether();
        let origin = ether.create_local_device().unwrap();
        let device = ether.create_local_device().unwrap();

        device.set_powered(false);
        assert!(!device.is_active());
        assert!(ether.reachable(device.address()).is_err());
        assert!(ether.inquiry_candidates(origin.address(), GIAC).is_empty());

        device.set_powered(true);
        assert!(ether.reachable(device.address()).is_ok());
        let found = ether.inquiry_candidates(origin.address(), GIAC);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.address(), device.address());
    }

    #[test]
    fn test_discoverable_modes() {
        let ether = ether();
        let device = ether.create_local_device().unwrap();
        assert_eq!(device.discoverable(), DiscoverableMode::General);

        assert!(device.set_discoverable(LIAC).unwrap());
        assert_eq!(device.discoverable(), DiscoverableMode::Limited);
        assert!(device
            .device_class()
            .service_classes()
            .contains(ServiceClasses::LIMITED_DISCOVERABLE));

        assert!(device.set_discoverable(GIAC).unwrap());
        assert!(!device
            .device_class()
            .service_classes()
            .contains(ServiceClasses::LIMITED_DISCOVERABLE));

        // Reserved but unsupported access codes are refused without error
        assert!(!device.set_discoverable(0x9E8B10).unwrap());
        assert_eq!(device.discoverable(), DiscoverableMode::General);
        assert!(matches!(device.set_discoverable(0x123456), Err(Error::InvalidParameter(_))));

        assert!(device.set_discoverable(NOT_DISCOVERABLE).unwrap());
        assert_eq!(device.discoverable(), DiscoverableMode::NotDiscoverable);
    }

    #[test]
    fn test_device_class_and_service_classes() {
        let ether = Ether::new(EmulatorConfig {
            device_class: crate::gap::DeviceClass::new(MAJOR_PHONE | 0x0C),
            ..EmulatorConfig::default()
        });
        let device = ether.create_local_device().unwrap();
        assert_eq!(device.device_class().major_device_class(), MAJOR_PHONE);
        assert_eq!(device.device_class().minor_device_class(), 0x0C);

        device.set_service_classes(ServiceClasses::OBJECT_TRANSFER | ServiceClasses::LIMITED_DISCOVERABLE);
        let classes = device.device_class().service_classes();
        assert!(classes.contains(ServiceClasses::OBJECT_TRANSFER));
        // Only the discoverable mode sets the limited bit
        assert!(!classes.contains(ServiceClasses::LIMITED_DISCOVERABLE));
        assert_eq!(device.device_class().major_device_class(), MAJOR_PHONE);
    }

    #[test]
    fn test_local_properties() {
        let ether = Ether::new(EmulatorConfig {
            max_attributes_retrievable: 64,
            max_concurrent_searches: 3,
            ..EmulatorConfig::default()
        });
        let device = ether.create_local_device().unwrap();
        assert_eq!(device.property("bluetooth.api.version").as_deref(), Some("1.1"));
        assert_eq!(device.property("bluetooth.sd.attr.retrievable.max").as_deref(), Some("64"));
        assert_eq!(device.property("bluetooth.sd.trans.max").as_deref(), Some("3"));
        assert_eq!(device.property("bluetooth.connected.devices.max").as_deref(), Some("7"));
        assert_eq!(device.property("bluesim.stack").as_deref(), Some("emulator"));
        assert_eq!(device.property("no.such.key"), None);
    }

    #[test]
    fn test_handle_table() {
        let ether = ether();
        let device = ether.create_local_device().unwrap();
        let table = HandleTable::new();
        let (_, server) = open_server(&device);

        let first = table.add(server.clone()).unwrap();
        let second = table.add(server.clone()).unwrap();
        assert_eq!(first, 1);
        assert!(second > first);
        assert_eq!(table.handles(), vec![first, second]);
        assert_eq!(
            table.get(first).unwrap().kind(),
            ConnectionKind {
                protocol: Protocol::Rfcomm,
                role: Role::Server,
            }
        );

        assert!(table.remove(first).is_some());
        assert!(table.remove(first).is_none());
        assert!(matches!(table.get(first), Err(Error::NotFound)));
        assert!(matches!(table.lookup(first), Err(Error::ConnectionClosed)));
        assert!(matches!(table.lookup(0), Err(Error::NotFound)));
        assert!(matches!(table.lookup(100), Err(Error::NotFound)));

        // Handles are not reused
        let third = table.add(server).unwrap();
        assert!(third > second);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_concurrent_close_removes_once() {
        let ether = ether();
        let device = ether.create_local_device().unwrap();
        let (handle, _) = open_server(&device);

        let closed: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| device.close_connection(handle)))
                .collect();
            workers.into_iter().map(|w| usize::from(w.join().unwrap())).sum()
        });
        assert_eq!(closed, 1);
        assert!(device.listener(Protocol::Rfcomm, 1).is_none());
    }

    #[test]
    fn test_server_close_releases_channel() {
        let ether = ether();
        let device = ether.create_local_device().unwrap();
        let (first, _) = open_server(&device);
        assert!(device.listener(Protocol::Rfcomm, 1).is_some());
        assert_eq!(device.services().len(), 1);

        assert!(device.close_connection(first));
        assert!(device.listener(Protocol::Rfcomm, 1).is_none());
        assert!(device.services().get(first).is_none());

        // The channel is free again
        let (second, server) = open_server(&device);
        assert_ne!(second, first);
        assert_eq!(server.server_channel(), Some(1));
    }
}

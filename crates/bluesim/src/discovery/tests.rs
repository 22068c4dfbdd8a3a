//! Tests for device inquiry and service search

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::EmulatorConfig;
    use crate::error::Error;
    use crate::ether::{Ether, LocalDevice};
    use crate::gap::{BdAddr, DeviceClass, RemoteDevice, GIAC, LIAC, NOT_DISCOVERABLE};
    use crate::sdp::ServiceRecord;
    use crate::stack::BluetoothStack;
    use crate::transport::ServerParams;
    use crate::uuid::Uuid;
    use std::sync::{Arc, Barrier, OnceLock, Weak};
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);
    const QUIET: Duration = Duration::from_millis(100);

    fn ether_with(inquiry_duration: Duration, search_latency: Duration) -> Arc<Ether> {
        Ether::new(EmulatorConfig {
            inquiry_duration,
            search_latency,
            ..EmulatorConfig::default()
        })
    }

    fn quick_ether() -> Arc<Ether> {
        ether_with(Duration::from_millis(20), Duration::ZERO)
    }

    fn stacks(ether: &Arc<Ether>, count: usize) -> Vec<BluetoothStack> {
        (0..count).map(|_| BluetoothStack::new(ether).unwrap()).collect()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn as_listener(collector: &Arc<EventCollector>) -> Arc<dyn DiscoveryListener> {
        Arc::clone(collector) as Arc<dyn DiscoveryListener>
    }

    #[test]
    fn test_inquiry_reports_other_devices_once() {
        let ether = quick_ether();
        let all = stacks(&ether, 4);
        let collector = Arc::new(EventCollector::new());

        all[0].start_inquiry(GIAC, as_listener(&collector)).unwrap();
        let (found, completion) = collector.wait_inquiry(WAIT).unwrap();
        assert_eq!(completion, InquiryCompletion::Completed);

        let found: Vec<BdAddr> = found.iter().map(|(device, _)| device.address()).collect();
        let mut expected: Vec<BdAddr> = all[1..].iter().map(|s| s.local_address()).collect();
        expected.sort();
        assert_eq!(found, expected);

        // Nothing follows the completion
        assert_eq!(collector.next_event(QUIET), None);
        assert_eq!(all[0].inquiry_state(), InquiryState::Completed);
    }

    #[test]
    fn test_discovered_device_carries_name_and_class() {
        let ether = quick_ether();
        let all = stacks(&ether, 2);
        all[1].set_local_name("Phone");
        let collector = Arc::new(EventCollector::new());

        all[0].start_inquiry(GIAC, as_listener(&collector)).unwrap();
        let (found, _) = collector.wait_inquiry(WAIT).unwrap();
        let (device, class) = &found[0];
        assert_eq!(device.cached_name().as_deref(), Some("Phone"));
        assert_eq!(device.friendly_name(&all[0], false), "Phone");
        assert_eq!(*class, all[1].device_class());
    }

    #[test]
    fn test_second_inquiry_is_rejected() {
        let ether = ether_with(Duration::from_millis(200), Duration::ZERO);
        let all = stacks(&ether, 2);
        let first = Arc::new(EventCollector::new());
        let second = Arc::new(EventCollector::new());

        all[0].start_inquiry(GIAC, as_listener(&first)).unwrap();
        assert_eq!(all[0].inquiry_state(), InquiryState::Running);
        assert_eq!(
            all[0].start_inquiry(GIAC, as_listener(&second)),
            Err(Error::AlreadyRunning)
        );

        // The first run is unaffected
        let (found, completion) = first.wait_inquiry(WAIT).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(completion, InquiryCompletion::Completed);
        assert!(second.drain().is_empty());

        // A new inquiry may start once the first has finished
        assert!(wait_until(|| all[0].inquiry_state() != InquiryState::Running));
        all[0].start_inquiry(GIAC, as_listener(&second)).unwrap();
        assert!(second.wait_inquiry(WAIT).is_some());
    }

    #[test]
    fn test_access_code_filtering() {
        let ether = quick_ether();
        let all = stacks(&ether, 5);
        all[1].set_discoverable(LIAC).unwrap();
        all[2].set_discoverable(NOT_DISCOVERABLE).unwrap();
        all[3].set_powered(false);

        let collector = Arc::new(EventCollector::new());
        all[0].start_inquiry(LIAC, as_listener(&collector)).unwrap();
        let (found, _) = collector.wait_inquiry(WAIT).unwrap();
        let found: Vec<_> = found.iter().map(|(d, _)| d.address()).collect();
        assert_eq!(found, vec![all[1].local_address()]);

        assert!(wait_until(|| all[0].inquiry_state() == InquiryState::Completed));
        all[0].start_inquiry(GIAC, as_listener(&collector)).unwrap();
        let (found, _) = collector.wait_inquiry(WAIT).unwrap();
        let mut found: Vec<_> = found.iter().map(|(d, _)| d.address()).collect();
        found.sort();
        let mut expected = vec![all[1].local_address(), all[4].local_address()];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_invalid_access_code() {
        let ether = quick_ether();
        let stack = BluetoothStack::new(&ether).unwrap();
        let collector = Arc::new(EventCollector::new());
        assert!(matches!(
            stack.start_inquiry(0x123456, as_listener(&collector)),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(stack.inquiry_state(), InquiryState::Idle);
    }

    #[test]
    fn test_cancel_inquiry() {
        let ether = ether_with(Duration::from_secs(30), Duration::ZERO);
        let all = stacks(&ether, 2);
        let owner = Arc::new(EventCollector::new());
        let stranger = Arc::new(EventCollector::new());

        all[0].start_inquiry(GIAC, as_listener(&owner)).unwrap();
        assert!(!all[0].cancel_inquiry(&stranger));
        assert!(all[0].cancel_inquiry(&owner));

        let (_, completion) = owner.wait_inquiry(WAIT).unwrap();
        assert_eq!(completion, InquiryCompletion::Terminated);
        assert_eq!(owner.next_event(QUIET), None);

        // Nothing left to cancel
        assert!(!all[0].cancel_inquiry(&owner));
        assert!(wait_until(|| all[0].inquiry_state() == InquiryState::Cancelled));
    }

    #[test]
    fn test_cancel_after_completion_fails() {
        let ether = quick_ether();
        let stack = BluetoothStack::new(&ether).unwrap();
        let collector = Arc::new(EventCollector::new());

        stack.start_inquiry(GIAC, as_listener(&collector)).unwrap();
        collector.wait_inquiry(WAIT).unwrap();
        assert!(!stack.cancel_inquiry(&collector));
    }

    /// Cancels its own inquiry from inside the first discovery callback
    struct SelfCancelling {
        device: Arc<LocalDevice>,
        me: OnceLock<Weak<SelfCancelling>>,
        events: EventCollector,
        cancelled: OnceLock<bool>,
    }

    impl DiscoveryListener for SelfCancelling {
        fn device_discovered(&self, device: &RemoteDevice, class: DeviceClass) {
            self.events.device_discovered(device, class);
            if let Some(me) = self.me.get().and_then(Weak::upgrade) {
                let _ = self.cancelled.set(inquiry::cancel(&self.device, &me));
            }
        }

        fn inquiry_completed(&self, completion: InquiryCompletion) {
            self.events.inquiry_completed(completion);
        }
    }

    #[test]
    fn test_cancel_from_listener_callback() {
        let ether = ether_with(Duration::from_secs(30), Duration::ZERO);
        let all = stacks(&ether, 4);
        let listener = Arc::new(SelfCancelling {
            device: Arc::clone(all[0].local_device()),
            me: OnceLock::new(),
            events: EventCollector::new(),
            cancelled: OnceLock::new(),
        });
        listener.me.set(Arc::downgrade(&listener)).unwrap();

        all[0]
            .start_inquiry(GIAC, Arc::clone(&listener) as Arc<dyn DiscoveryListener>)
            .unwrap();
        let (found, completion) = listener.events.wait_inquiry(WAIT).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(completion, InquiryCompletion::Terminated);
        assert_eq!(listener.cancelled.get(), Some(&true));
    }

    #[test]
    fn test_release_aborts_inquiry() {
        let ether = ether_with(Duration::from_secs(30), Duration::ZERO);
        let all = stacks(&ether, 2);
        let collector = Arc::new(EventCollector::new());

        all[0].start_inquiry(GIAC, as_listener(&collector)).unwrap();
        ether.release_local_device(all[0].local_device());

        let (_, completion) = collector.wait_inquiry(WAIT).unwrap();
        assert_eq!(completion, InquiryCompletion::NoLocalDevice);
        assert!(matches!(
            all[0].start_inquiry(GIAC, as_listener(&collector)),
            Err(Error::StateError(_))
        ));
    }

    fn open_object_push(stack: &BluetoothStack) -> ServiceRecord {
        let params = ServerParams {
            obex: true,
            ..ServerParams::new(Uuid::OBEX_OBJECT_PUSH, "Object Push")
        };
        stack.rfcomm_server_open(&params).unwrap().1
    }

    #[test]
    fn test_search_finds_matching_records() {
        let ether = quick_ether();
        let all = stacks(&ether, 2);
        let record = open_object_push(&all[1]);
        all[1]
            .rfcomm_server_open(&ServerParams::new(Uuid::SERIAL_PORT, "Serial"))
            .unwrap();

        let collector = Arc::new(EventCollector::new());
        let remote = RemoteDevice::new(all[1].local_address());
        let id = all[0]
            .search_services(&[0x0100], &[Uuid::OBEX_OBJECT_PUSH], &remote, as_listener(&collector))
            .unwrap();
        assert_ne!(id, NO_TRANSACTION);

        let (records, completion) = collector.wait_search(id, WAIT).unwrap();
        assert_eq!(completion, SearchCompletion::Completed);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handle(), record.handle());
        assert_eq!(records[0].service_name(), Some("Object Push"));
        assert!(records[0].attribute(0x0005).is_none());

        assert!(wait_until(|| !ether.searches().is_active(id)));
        assert!(!all[0].cancel_service_search(id));
    }

    #[test]
    fn test_search_without_matches_completes() {
        let ether = quick_ether();
        let all = stacks(&ether, 2);
        open_object_push(&all[1]);

        let collector = Arc::new(EventCollector::new());
        let remote = RemoteDevice::new(all[1].local_address());
        let id = all[0]
            .search_services(&[], &[Uuid::OBEX_FILE_TRANSFER], &remote, as_listener(&collector))
            .unwrap();

        assert_eq!(
            collector.next_event(WAIT),
            Some(DiscoveryEvent::SearchCompleted {
                transaction: id,
                completion: SearchCompletion::Completed,
            })
        );
        assert_eq!(collector.next_event(QUIET), None);
    }

    #[test]
    fn test_search_of_unknown_device() {
        let ether = quick_ether();
        let stack = BluetoothStack::new(&ether).unwrap();
        let collector = Arc::new(EventCollector::new());
        let remote = RemoteDevice::new(BdAddr::from_u64(0x0000_0000_0042));

        let id = stack
            .search_services(&[], &[Uuid::SERIAL_PORT], &remote, as_listener(&collector))
            .unwrap();
        assert_ne!(id, NO_TRANSACTION);
        assert_eq!(
            collector.next_event(WAIT),
            Some(DiscoveryEvent::SearchCompleted {
                transaction: id,
                completion: SearchCompletion::DeviceNotReachable,
            })
        );
        assert_eq!(collector.next_event(QUIET), None);
    }

    #[test]
    fn test_cancel_running_search() {
        let ether = ether_with(Duration::from_millis(20), Duration::from_secs(30));
        let all = stacks(&ether, 2);
        open_object_push(&all[1]);

        let collector = Arc::new(EventCollector::new());
        let remote = RemoteDevice::new(all[1].local_address());
        let id = all[0]
            .search_services(&[], &[Uuid::OBEX_OBJECT_PUSH], &remote, as_listener(&collector))
            .unwrap();

        assert!(all[0].cancel_service_search(id));
        assert!(!all[0].cancel_service_search(id));
        assert_eq!(
            collector.next_event(WAIT),
            Some(DiscoveryEvent::SearchCompleted {
                transaction: id,
                completion: SearchCompletion::Terminated,
            })
        );
        assert_eq!(collector.next_event(QUIET), None);
        assert!(!all[0].cancel_service_search(NO_TRANSACTION));
    }

    /// Holds the worker inside `services_discovered` until released
    struct BlockingListener {
        events: EventCollector,
        entered: Barrier,
        release: Barrier,
    }

    impl DiscoveryListener for BlockingListener {
        fn services_discovered(&self, transaction: TransactionId, records: &[ServiceRecord]) {
            self.events.services_discovered(transaction, records);
            self.entered.wait();
            self.release.wait();
        }

        fn service_search_completed(&self, transaction: TransactionId, completion: SearchCompletion) {
            self.events.service_search_completed(transaction, completion);
        }
    }

    #[test]
    fn test_cancel_during_delivery_waits_and_terminates() {
        let ether = quick_ether();
        let all = stacks(&ether, 2);
        open_object_push(&all[1]);
        let remote = RemoteDevice::new(all[1].local_address());
        let listener = Arc::new(BlockingListener {
            events: EventCollector::new(),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });

        let id = all[0]
            .search_services(
                &[],
                &[Uuid::OBEX_OBJECT_PUSH],
                &remote,
                Arc::clone(&listener) as Arc<dyn DiscoveryListener>,
            )
            .unwrap();
        listener.entered.wait();

        let cancelled = thread::scope(|scope| {
            let canceller = scope.spawn(|| all[0].cancel_service_search(id));
            // Cancel does not return while the delivery is in flight
            thread::sleep(QUIET);
            assert!(!canceller.is_finished());
            listener.release.wait();
            canceller.join().unwrap()
        });
        assert!(cancelled);

        let events: Vec<_> = std::iter::from_fn(|| listener.events.next_event(WAIT))
            .take(2)
            .collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            DiscoveryEvent::ServicesDiscovered { transaction, records } if *transaction == id && records.len() == 1
        ));
        assert_eq!(
            events[1],
            DiscoveryEvent::SearchCompleted {
                transaction: id,
                completion: SearchCompletion::Terminated,
            }
        );
        assert_eq!(listener.events.next_event(QUIET), None);
    }

    #[test]
    fn test_concurrent_searches_are_independent() {
        let ether = ether_with(Duration::from_millis(20), Duration::from_millis(200));
        let all = stacks(&ether, 2);
        open_object_push(&all[1]);
        let remote = RemoteDevice::new(all[1].local_address());

        let collector = Arc::new(EventCollector::new());
        let first = all[0]
            .search_services(&[], &[Uuid::OBEX_OBJECT_PUSH], &remote, as_listener(&collector))
            .unwrap();
        let second = all[0]
            .search_services(&[], &[Uuid::OBEX_OBJECT_PUSH], &remote, as_listener(&collector))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(ether.searches().running_for(all[0].local_address()), 2);

        assert!(all[0].cancel_service_search(first));
        let (_, completion) = collector.wait_search(second, WAIT).unwrap();
        assert_eq!(completion, SearchCompletion::Completed);
        let (records, completion) = collector.wait_search(first, WAIT).unwrap();
        assert!(records.is_empty());
        assert_eq!(completion, SearchCompletion::Terminated);
    }

    #[test]
    fn test_search_limits() {
        let ether = Ether::new(EmulatorConfig {
            search_latency: Duration::from_secs(30),
            max_concurrent_searches: 1,
            max_attributes_retrievable: 2,
            ..EmulatorConfig::default()
        });
        let all = stacks(&ether, 2);
        let remote = RemoteDevice::new(all[1].local_address());
        let collector = Arc::new(EventCollector::new());

        assert!(matches!(
            all[0].search_services(&[], &[], &remote, as_listener(&collector)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            all[0].search_services(&[1, 2, 3], &[Uuid::SERIAL_PORT], &remote, as_listener(&collector)),
            Err(Error::InvalidParameter(_))
        ));

        let id = all[0]
            .search_services(&[], &[Uuid::SERIAL_PORT], &remote, as_listener(&collector))
            .unwrap();
        assert!(matches!(
            all[0].search_services(&[], &[Uuid::SERIAL_PORT], &remote, as_listener(&collector)),
            Err(Error::StateError(_))
        ));
        assert!(all[0].cancel_service_search(id));
    }

    #[test]
    fn test_release_aborts_searches() {
        let ether = ether_with(Duration::from_millis(20), Duration::from_secs(30));
        let all = stacks(&ether, 2);
        let remote = RemoteDevice::new(all[1].local_address());
        let collector = Arc::new(EventCollector::new());

        let id = all[0]
            .search_services(&[], &[Uuid::SERIAL_PORT], &remote, as_listener(&collector))
            .unwrap();
        ether.release_local_device(all[1].local_device());

        let (_, completion) = collector.wait_search(id, WAIT).unwrap();
        assert_eq!(completion, SearchCompletion::DeviceNotReachable);
        assert!(!all[0].cancel_service_search(id));
    }

    /// Panics on every intermediate notification
    struct Panicking(EventCollector);

    impl DiscoveryListener for Panicking {
        fn services_discovered(&self, _transaction: TransactionId, _records: &[ServiceRecord]) {
            panic!("listener failure");
        }

        fn service_search_completed(&self, transaction: TransactionId, completion: SearchCompletion) {
            self.0.service_search_completed(transaction, completion);
        }
    }

    #[test]
    fn test_panicking_listener_ends_with_error() {
        let ether = quick_ether();
        let all = stacks(&ether, 2);
        open_object_push(&all[1]);
        let remote = RemoteDevice::new(all[1].local_address());
        let listener = Arc::new(Panicking(EventCollector::new()));

        let id = all[0]
            .search_services(
                &[],
                &[Uuid::OBEX_OBJECT_PUSH],
                &remote,
                Arc::clone(&listener) as Arc<dyn DiscoveryListener>,
            )
            .unwrap();
        let (_, completion) = listener.0.wait_search(id, WAIT).unwrap();
        assert_eq!(completion, SearchCompletion::Error);
    }

    #[test]
    fn test_completion_codes() {
        assert_eq!(InquiryCompletion::Completed.code(), 0x00);
        assert_eq!(InquiryCompletion::Terminated.code(), 0x05);
        assert_eq!(SearchCompletion::Completed.code(), 0x01);
        assert_eq!(SearchCompletion::DeviceNotReachable.code(), 0x06);
    }
}

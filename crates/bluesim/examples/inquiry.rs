use bluesim::{BluetoothStack, EmulatorConfig, Ether, EventCollector, DiscoveryListener, GIAC, LIAC};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let ether = Ether::new(EmulatorConfig {
        inquiry_duration: Duration::from_millis(500),
        ..EmulatorConfig::default()
    });

    // A scanner and a few devices around it
    let scanner = BluetoothStack::new(&ether)?;
    let peers: Vec<BluetoothStack> = (0..3)
        .map(|_| BluetoothStack::new(&ether))
        .collect::<Result<_, _>>()?;
    peers[0].set_local_name("Headset");
    peers[1].set_discoverable(LIAC)?;

    println!("Local device: {} ({})", scanner.local_name(), scanner.local_address());

    let collector = Arc::new(EventCollector::new());
    scanner.start_inquiry(GIAC, Arc::clone(&collector) as Arc<dyn DiscoveryListener>)?;

    match collector.wait_inquiry(Duration::from_secs(5)) {
        Some((devices, completion)) => {
            println!("Inquiry finished: {:?}", completion);
            for (device, class) in devices {
                println!(
                    "  {} '{}' class 0x{:06X} services {:?}",
                    device.address(),
                    device.friendly_name(&scanner, false),
                    class.raw(),
                    class.service_classes()
                );
            }
        }
        None => println!("Inquiry did not finish in time"),
    }

    Ok(())
}

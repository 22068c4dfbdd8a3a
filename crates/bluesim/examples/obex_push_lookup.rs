use bluesim::{BluetoothStack, EmulatorConfig, Ether, RemoteDevice, ServerParams, Uuid};
use std::error::Error;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let ether = Ether::new(EmulatorConfig::default());
    let phone = BluetoothStack::new(&ether)?;
    let laptop = BluetoothStack::new(&ether)?;

    // The phone offers Object Push over OBEX
    let params = ServerParams {
        obex: true,
        ..ServerParams::new(Uuid::OBEX_OBJECT_PUSH, "OBEX Object Push")
    };
    let (server, record) = phone.rfcomm_server_open(&params)?;
    println!(
        "Phone {} listening on RFCOMM channel {:?}",
        phone.local_bluetooth_address(),
        record.rfcomm_channel()
    );

    let acceptor = thread::spawn(move || -> bluesim::Result<Vec<u8>> {
        let handle = phone.rfcomm_accept(server)?;
        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = phone.rfcomm_read(handle, &mut buf)?;
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        phone.close(handle);
        Ok(received)
    });

    // The laptop looks for Object Push, then File Transfer
    let remote = RemoteDevice::new(record.host());
    let url = laptop.find_service_url(
        &remote,
        &[Uuid::OBEX_OBJECT_PUSH, Uuid::OBEX_FILE_TRANSFER],
        Duration::from_secs(5),
    )?;
    let Some(url) = url else {
        println!("No OBEX service found");
        return Ok(());
    };
    println!("Found {}", url);

    let handle = laptop.connect_url(&url)?;
    laptop.rfcomm_write(handle, b"hello from the laptop")?;
    laptop.rfcomm_flush(handle)?;
    laptop.close(handle);

    match acceptor.join() {
        Ok(Ok(data)) => println!("Phone received {:?}", String::from_utf8_lossy(&data)),
        Ok(Err(e)) => println!("Phone failed: {}", e),
        Err(_) => println!("Phone thread panicked"),
    }
    Ok(())
}

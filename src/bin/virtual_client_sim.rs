#[cfg(unix)]
fn main() -> std::io::Result<()> {
    use std::thread;
    use std::time::Duration;

    use log::{LevelFilter, warn};
    use pacemaker::client::protocol::catalog::DeviceType;
    use pacemaker::client::protocol::port_handler::PortHandler;
    use pacemaker::client::protocol::virtual_uart::VirtualUartPort;
    use pacemaker::client::sim::PacemakerClientSim;

    if let Err(err) = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .without_timestamps()
        .init()
    {
        eprintln!("logger setup failed: {err}");
    }

    let mut sim = PacemakerClientSim::new();
    let mut port = VirtualUartPort::new()?;

    println!("Virtual Pacemaker client ready.");
    println!("Slave device: {}", port.slave_path());
    println!(
        "Firmware: {} ({} steppers)",
        sim.config().firmware_name,
        sim.config()
            .device_counts
            .get(&DeviceType::Stepper)
            .copied()
            .unwrap_or(0)
    );
    println!("Press Ctrl-C to stop.");

    loop {
        let available = port.get_bytes_available()?;
        if available > 0 {
            let data = port.read_port(available)?;
            let response = sim.handle_bytes(&data);
            if !response.is_empty() {
                let written = port.write_port(&response)?;
                if written != response.len() {
                    warn!("Only {written} of {} reply bytes sent", response.len());
                }
            }
        } else {
            thread::sleep(Duration::from_millis(2));
        }
    }
}

#[cfg(not(unix))]
fn main() {
    eprintln!("virtual_client_sim is only supported on Unix-like systems.");
}

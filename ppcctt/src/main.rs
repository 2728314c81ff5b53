use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::{LevelFilter, error, trace};
use pacemaker::client::protocol::port_handler::{PortHandler, SimPort};
use pacemaker::client::protocol::protocol_packet_handler::ProtocolPacketHandler;
use pacemaker::client::protocol::serial_port::{ConnectionDescriptor, SerialPortHandler};
use pacemaker::conformance::{ConformanceRun, FirmwareSetting, load_firmware_configuration};

const SEPARATOR: &str =
    "===============================================================================";

#[derive(Debug, Parser)]
#[command(
    name = "ppcctt",
    about = "Pacemaker protocol client compliance test tool",
    after_help = "Example: ppcctt /dev/ttyACM0:115200:8:None:1:false:false:false:false"
)]
struct Args {
    /// port:baud:dataBits:parity:stopBits:rtsCtsIn:rtsCtsOut:xonXoffIn:xonXoffOut
    #[arg(value_name = "CONNECTION", required_unless_present = "simulate")]
    connection: Option<String>,

    /// After connecting wait this many milliseconds. Arduino boards with auto reset need -b 1000.
    #[arg(short = 'b', value_name = "MS", default_value_t = 0)]
    boot_delay_ms: u64,

    /// Apply the firmware configuration in this file before testing.
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output, repeat for even more.
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Test the built-in client simulator instead of a serial port.
    #[arg(long)]
    simulate: bool,
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run_tests<P: PortHandler>(
    handler: &mut ProtocolPacketHandler<P>,
    connection: &str,
    settings: Vec<FirmwareSetting>,
) -> bool {
    let result = ConformanceRun::new(handler, connection)
        .with_firmware_settings(settings)
        .run();
    let info = match result {
        Ok(info) => info,
        Err(err) => {
            error!("Command layer tests failed: {err}");
            return false;
        }
    };
    if let Err(err) = handler.close() {
        error!("Closing the connection failed: {err}");
        return false;
    }
    trace!("Connection to {connection} closed");
    println!("{SEPARATOR}");
    println!("Test finished for :");
    println!("{info}");
    println!("{SEPARATOR}");
    println!("All tests successful!");
    true
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger = simple_logger::SimpleLogger::new().with_level(level_for(args.verbose));
    if args.verbose == 0 {
        logger = logger.without_timestamps();
    }
    if let Err(err) = logger.init() {
        eprintln!("logger setup failed: {err}");
    }

    let settings = match &args.config {
        Some(path) => match load_firmware_configuration(path) {
            Ok(settings) => settings,
            Err(err) => {
                error!("Failed to apply firmware configuration: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    println!("Please make sure that the client has been reset before starting this test!");

    let success = if args.simulate {
        let mut handler = ProtocolPacketHandler::new(SimPort::default());
        run_tests(&mut handler, "simulator", settings)
    } else {
        let Some(connection) = args.connection.as_deref() else {
            error!("No connection descriptor given!");
            return ExitCode::FAILURE;
        };
        let descriptor = match ConnectionDescriptor::parse(connection) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!("{err}");
                return ExitCode::FAILURE;
            }
        };
        trace!("Connecting to {descriptor}");
        let port = match SerialPortHandler::open(&descriptor) {
            Ok(port) => port,
            Err(err) => {
                error!("Connecting to {} failed: {err}", descriptor.port);
                return ExitCode::FAILURE;
            }
        };
        if args.boot_delay_ms > 0 {
            println!("Delay of {}ms!", args.boot_delay_ms);
            thread::sleep(Duration::from_millis(args.boot_delay_ms));
        }
        let mut handler = ProtocolPacketHandler::new(port);
        run_tests(&mut handler, connection, settings)
    };

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Debug);
        assert_eq!(level_for(5), LevelFilter::Trace);
    }

    #[test]
    fn connection_required_without_simulator() {
        assert!(Args::try_parse_from(["ppcctt"]).is_err());
        let args = Args::try_parse_from(["ppcctt", "--simulate", "-v", "-v"]).expect("parse");
        assert!(args.simulate);
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["ppcctt", "-b", "1000", "-c", "fw.cfg", "COM3:115200"])
            .expect("parse");
        assert_eq!(args.connection.as_deref(), Some("COM3:115200"));
        assert_eq!(args.boot_delay_ms, 1000);
        assert_eq!(args.config, Some(PathBuf::from("fw.cfg")));
    }

    #[test]
    fn simulator_run_succeeds() {
        let mut handler = ProtocolPacketHandler::new(SimPort::default());
        assert!(run_tests(&mut handler, "simulator", Vec::new()));
    }
}

//! Implements discovering and opening the serial port of a robot, and the
//! session that talks to it.

use serialport::{SerialPortInfo, SerialPortType};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::config::SerialConfig;
use crate::errors::DeviceError;

pub mod listener;
pub mod session;

pub use listener::SharedState;
pub use session::{AsuroSession, SerialSession, SessionState};

/// What kind of link a serial port goes over
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AsuroPortType {
    /// A paired robot exposed as an RFCOMM serial port
    Bluetooth,
    /// A USB serial adapter, e.g. the IR transceiver of the robot kit
    Usb,
    Other,
}

/// The information of a candidate serial port
#[derive(Clone, Debug)]
pub struct AsuroSerialPort {
    pub port_info: SerialPortInfo,
    pub port_type: AsuroPortType,
}

/// Finds all serial ports a robot could be connected through.
/// Bluetooth ports are listed first.
pub fn find_serial_ports() -> Result<Vec<AsuroSerialPort>, DeviceError> {
    // Get all available serial ports
    let ports = serialport::available_ports()?;

    let mut candidates: Vec<AsuroSerialPort> = ports
        .into_iter()
        .filter_map(|port| {
            let port_type = match &port.port_type {
                SerialPortType::BluetoothPort => AsuroPortType::Bluetooth,
                // Linux lists bound RFCOMM devices without a type
                _ if port.port_name.contains("rfcomm") => AsuroPortType::Bluetooth,
                SerialPortType::UsbPort(_) => AsuroPortType::Usb,
                SerialPortType::Unknown => AsuroPortType::Other,
                // Built-in PCI ports are never the robot
                SerialPortType::PciPort => return None,
            };
            Some(AsuroSerialPort {
                port_info: port,
                port_type,
            })
        })
        .collect();

    candidates.sort_by_key(|port| port.port_type);
    log::debug!("Found {} candidate serial ports", candidates.len());

    Ok(candidates)
}

/// Picks the configured port, or the first discovered one.
pub fn resolve_port(config: &SerialConfig) -> Result<String, DeviceError> {
    if let Some(port) = &config.port {
        return Ok(port.clone());
    }

    find_serial_ports()?
        .into_iter()
        .next()
        .map(|port| port.port_info.port_name)
        .ok_or(DeviceError::NoPortFound)
}

/// Opens a serial port with the 8N1 framing Firmata uses.
pub fn open_serial(path: &str, config: &SerialConfig) -> Result<SerialStream, DeviceError> {
    log::info!("Opening {path} at {} baud", config.baud_rate);

    let stream = tokio_serial::new(path, config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(config.timeout())
        .open_native_async()?;

    Ok(stream)
}

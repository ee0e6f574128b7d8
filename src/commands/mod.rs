// Module that contains all frames that can be sent to the board

mod simple;
pub use simple::{
    AnalogWrite, DigitalWrite, ReportAnalogPin, ReportDigitalPort, ReportFirmware, ReportVersion,
    SetPinMode,
};

mod sysex;
pub use sysex::SysEx;

mod asuro;
pub use asuro::{ControlledMove, OdometryDebug, OdometryLevels};

/// A command trait that every outbound frame implements.
///
/// Firmata writes are fire-and-forget, so there is no response to decode.
/// Everything the board sends back is handled by the listener.
pub trait Command {
    /// Encodes the library->board frame
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError>;
}

//! Implements the core Firmata messages: pin writes, pin modes and reporting.

use super::Command;
use crate::protocol::{split_14bit, FirmataCommand, PinMode, SysexCommand, MAX_14BIT};

/// Writes an analog (PWM) value to a pin
///
/// # Members
///
/// * `0` - The pin number
/// * `1` - The value, 14 bits at most
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AnalogWrite(pub u8, pub u16);

impl Command for AnalogWrite {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        let value = self.1.min(MAX_14BIT);

        // The channel message only has a nibble for the pin.
        // Higher pins need the extended analog SysEx.
        if self.0 > 0x0F {
            let [lo, hi] = split_14bit(value);
            return super::SysEx(SysexCommand::ExtendedAnalog as u8, &[self.0 & 0x7F, lo, hi])
                .encode_request();
        }

        let [lo, hi] = split_14bit(value);
        Ok(vec![FirmataCommand::AnalogMessage as u8 | self.0, lo, hi])
    }
}

/// Writes the value of a whole digital port (8 pins)
///
/// # Members
///
/// * `0` - The port number
/// * `1` - The port bitmask
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DigitalWrite(pub u8, pub u8);

impl Command for DigitalWrite {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        let [lo, hi] = split_14bit(self.1 as u16);
        Ok(vec![FirmataCommand::DigitalMessage as u8 | (self.0 & 0x0F), lo, hi])
    }
}

/// Sets the mode of a pin
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SetPinMode(pub u8, pub PinMode);

impl Command for SetPinMode {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        Ok(vec![FirmataCommand::SetPinMode as u8, self.0 & 0x7F, self.1 as u8])
    }
}

/// Enables or disables reporting of an analog channel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReportAnalogPin(pub u8, pub bool);

impl Command for ReportAnalogPin {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        Ok(vec![FirmataCommand::ReportAnalog as u8 | (self.0 & 0x0F), self.1 as u8])
    }
}

/// Enables or disables reporting of a digital port
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReportDigitalPort(pub u8, pub bool);

impl Command for ReportDigitalPort {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        Ok(vec![FirmataCommand::ReportDigital as u8 | (self.0 & 0x0F), self.1 as u8])
    }
}

/// Asks the board for its firmware name and version
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReportFirmware;

impl Command for ReportFirmware {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        super::SysEx(SysexCommand::ReportFirmware as u8, &[]).encode_request()
    }
}

/// Asks the board for the protocol version it speaks
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReportVersion;

impl Command for ReportVersion {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        Ok(vec![FirmataCommand::ReportVersion as u8])
    }
}

//! Firmata protocol constants and the 7-bit packing helpers shared by the
//! encoders and the decoder.
pub mod decoder;
pub use decoder::{FrameDecoder, InboundMessage};

/// Largest value that fits in two 7-bit data bytes.
pub const MAX_14BIT: u16 = 0x3FFF;

/// Largest raw value of the 10-bit analog converter.
pub const MAX_ANALOG_SAMPLE: u16 = 1023;

/// The default baud rate of StandardFirmata.
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Firmata status bytes. The low nibble of the channel messages
/// (analog, digital, report analog, report digital) carries the pin or port.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmataCommand {
    DigitalMessage = 0x90,
    ReportAnalog = 0xC0,
    ReportDigital = 0xD0,
    AnalogMessage = 0xE0,
    StartSysex = 0xF0,
    SetPinMode = 0xF4,
    EndSysex = 0xF7,
    ReportVersion = 0xF9,
}

impl FirmataCommand {
    /// Maps a status byte onto its command, masking the channel nibble where
    /// the command carries one.
    pub fn from_status(byte: u8) -> Option<Self> {
        match byte & 0xF0 {
            0x90 => return Some(Self::DigitalMessage),
            0xC0 => return Some(Self::ReportAnalog),
            0xD0 => return Some(Self::ReportDigital),
            0xE0 => return Some(Self::AnalogMessage),
            _ => {}
        }
        match byte {
            0xF0 => Some(Self::StartSysex),
            0xF4 => Some(Self::SetPinMode),
            0xF7 => Some(Self::EndSysex),
            0xF9 => Some(Self::ReportVersion),
            _ => None,
        }
    }
}

/// SysEx command ids. `0x44..=0x46` are the Asuro firmware extensions.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysexCommand {
    ControlledMove = 0x44,
    OdometryLevels = 0x45,
    OdometryDebug = 0x46,
    ExtendedAnalog = 0x6F,
    StringData = 0x71,
    ReportFirmware = 0x79,
}

/// Pin modes understood by `SET_PIN_MODE`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output = 0x01,
    Pwm = 0x03,
}

/// Clamps a value into the 14-bit range, warning when it had to.
pub fn clamp_14bit(field: &str, value: i64) -> u16 {
    if value > MAX_14BIT as i64 {
        log::warn!("{field} {value} exceeds {MAX_14BIT}, clamping");
        MAX_14BIT
    } else if value < 0 {
        log::warn!("{field} {value} is negative, clamping to 0");
        0
    } else {
        value as u16
    }
}

/// Splits a 14-bit value into (low 7 bits, bits 7-13).
pub fn split_14bit(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

/// Joins two 7-bit data bytes back into one value.
pub fn join_14bit(lo: u8, hi: u8) -> u16 {
    (lo as u16 & 0x7F) | ((hi as u16 & 0x7F) << 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_max_value() {
        assert_eq!(split_14bit(16383), [0x7F, 0x7F]);
        assert_eq!(split_14bit(200), [0x48, 0x01]);
    }

    #[test]
    fn clamp_both_ends() {
        assert_eq!(clamp_14bit("steps", 20000), MAX_14BIT);
        assert_eq!(clamp_14bit("steps", -4), 0);
        assert_eq!(clamp_14bit("steps", 42), 42);
    }

    #[test]
    fn status_bytes_mask_channel() {
        assert_eq!(FirmataCommand::from_status(0xE4), Some(FirmataCommand::AnalogMessage));
        assert_eq!(FirmataCommand::from_status(0x91), Some(FirmataCommand::DigitalMessage));
        assert_eq!(FirmataCommand::from_status(0xF9), Some(FirmataCommand::ReportVersion));
        assert_eq!(FirmataCommand::from_status(0xF1), None);
        assert_eq!(FirmataCommand::from_status(0xFF), None);
    }
}

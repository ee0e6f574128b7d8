//! Streaming decoder for the frames a Firmata board sends back.
//!
//! The decoder is fed one byte at a time (or a whole read buffer through
//! [FrameDecoder::feed]) and keeps partial frames between calls, so it does
//! not matter how the transport chunks its reads.

use super::{join_14bit, FirmataCommand, SysexCommand};

/// Upper bound on buffered SysEx data. Anything longer is dropped.
const MAX_SYSEX_LEN: usize = 512;

/// A message decoded from the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A 14-bit sample from an analog channel (the firmware sends 10 bits)
    Analog { pin: u8, value: u16 },
    /// The state of a whole digital port
    Digital { port: u8, value: u16 },
    ProtocolVersion { major: u8, minor: u8 },
    FirmwareVersion { major: u8, minor: u8, name: String },
    StringData(String),
    /// Any other SysEx frame, with its command byte split off
    Sysex { command: u8, data: Vec<u8> },
    /// A byte that does not belong to any frame we understand
    Unknown(u8),
}

/// Resumable Firmata frame parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    status: Option<u8>,
    data: Vec<u8>,
    in_sysex: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes every complete message contained in `bytes`.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<InboundMessage> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    /// Pushes a single byte, returning a message when it completes one.
    pub fn push(&mut self, byte: u8) -> Option<InboundMessage> {
        if self.in_sysex {
            if byte == FirmataCommand::EndSysex as u8 {
                self.in_sysex = false;
                let data = std::mem::take(&mut self.data);
                return Some(decode_sysex(data));
            }

            if byte & 0x80 == 0 {
                if self.data.len() < MAX_SYSEX_LEN {
                    self.data.push(byte);
                } else {
                    log::debug!("Dropping SysEx frame longer than {MAX_SYSEX_LEN} bytes");
                    self.in_sysex = false;
                    self.data.clear();
                }
                return None;
            }

            // A status byte inside a SysEx frame aborts it. The byte itself
            // starts the next frame.
            log::debug!("SysEx frame aborted by status byte {byte:#04x}");
            self.in_sysex = false;
            self.data.clear();
        }

        if byte & 0x80 != 0 {
            self.data.clear();
            self.status = None;

            if byte == FirmataCommand::StartSysex as u8 {
                self.in_sysex = true;
                return None;
            }

            if expected_len(byte).is_some() {
                self.status = Some(byte);
                return None;
            }

            return Some(InboundMessage::Unknown(byte));
        }

        // A data byte with no frame to belong to
        let Some(status) = self.status else {
            return Some(InboundMessage::Unknown(byte));
        };

        self.data.push(byte);
        if self.data.len() < expected_len(status).unwrap_or(0) {
            return None;
        }

        let (lo, hi) = (self.data[0], self.data[1]);
        self.data.clear();
        self.status = None;

        match FirmataCommand::from_status(status) {
            Some(FirmataCommand::AnalogMessage) => Some(InboundMessage::Analog {
                pin: status & 0x0F,
                value: join_14bit(lo, hi),
            }),
            Some(FirmataCommand::DigitalMessage) => Some(InboundMessage::Digital {
                port: status & 0x0F,
                value: join_14bit(lo, hi),
            }),
            Some(FirmataCommand::ReportVersion) => Some(InboundMessage::ProtocolVersion {
                major: lo,
                minor: hi,
            }),
            _ => None,
        }
    }
}

/// The number of data bytes that follow a status byte we decode.
fn expected_len(status: u8) -> Option<usize> {
    match FirmataCommand::from_status(status)? {
        FirmataCommand::AnalogMessage
        | FirmataCommand::DigitalMessage
        | FirmataCommand::ReportVersion => Some(2),
        _ => None,
    }
}

fn decode_sysex(data: Vec<u8>) -> InboundMessage {
    let Some((&command, rest)) = data.split_first() else {
        return InboundMessage::Unknown(FirmataCommand::EndSysex as u8);
    };

    if command == SysexCommand::ReportFirmware as u8 && rest.len() >= 2 {
        return InboundMessage::FirmwareVersion {
            major: rest[0],
            minor: rest[1],
            name: decode_14bit_string(&rest[2..]),
        };
    }

    if command == SysexCommand::StringData as u8 {
        return InboundMessage::StringData(decode_14bit_string(rest));
    }

    InboundMessage::Sysex {
        command,
        data: rest.to_vec(),
    }
}

/// Strings travel as one character per pair of 7-bit bytes.
fn decode_14bit_string(bytes: &[u8]) -> String {
    bytes
        .chunks(2)
        .map(|pair| join_14bit(pair[0], pair.get(1).copied().unwrap_or(0)))
        .filter_map(|c| char::from_u32(c as u32))
        .collect()
}

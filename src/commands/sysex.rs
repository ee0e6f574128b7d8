use crate::protocol::FirmataCommand;

use super::Command;

/// The structure base of all SysEx commands
/// The first u8 is the SysEx command ID, the second is the
/// command's payload. Every payload byte has to fit in 7 bits.
pub struct SysEx<'a>(pub u8, pub &'a [u8]);

impl<'a> Command for SysEx<'a> {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        // A byte with the high bit set would be read as a status byte
        // and end the frame early on the board.
        if let Some((offset, byte)) = self.1.iter().enumerate().find(|(_, b)| **b & 0x80 != 0) {
            return Err(crate::errors::DecodeError::NotSevenBit(offset, *byte));
        }

        let mut packet = Vec::with_capacity(self.1.len() + 3);
        packet.push(FirmataCommand::StartSysex as u8);
        packet.push(self.0 & 0x7F);
        packet.extend(self.1);
        packet.push(FirmataCommand::EndSysex as u8);

        Ok(packet)
    }
}

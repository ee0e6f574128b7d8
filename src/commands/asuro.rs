//! Implements the vendor SysEx commands of the Asuro odometry firmware.

use crate::asuro::Direction;
use crate::protocol::{clamp_14bit, split_14bit, SysexCommand};

use super::Command;

/// The largest speed the firmware accepts, in percent.
pub const MAX_SPEED_PERCENT: u32 = 100;

/// Drives both motors a number of wheel-encoder steps at a given speed.
///
/// Step counts are clamped to 14 bits, directions travel as 7-bit two's
/// complement (`1` forward, `0x7F` backward) and the speed is clamped to
/// `0..=100` percent.
///
/// # Examples
///
/// ```rust
/// use asuro_firmata::asuro::Direction;
/// use asuro_firmata::commands::{Command, ControlledMove};
///
/// let frame = ControlledMove {
///     left_steps: 26,
///     right_steps: 26,
///     left_dir: Direction::Forward,
///     right_dir: Direction::Backward,
///     speed: 40,
/// }
/// .encode_request()
/// .unwrap();
///
/// assert_eq!(frame, vec![0xF0, 0x44, 26, 0, 26, 0, 0x01, 0x7F, 40, 0xF7]);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlledMove {
    pub left_steps: u32,
    pub right_steps: u32,
    pub left_dir: Direction,
    pub right_dir: Direction,
    pub speed: u32,
}

impl ControlledMove {
    /// The 7 payload bytes of the frame
    pub fn payload(&self) -> [u8; 7] {
        let [left_lo, left_hi] = split_14bit(clamp_14bit("left steps", self.left_steps as i64));
        let [right_lo, right_hi] =
            split_14bit(clamp_14bit("right steps", self.right_steps as i64));

        let speed = if self.speed > MAX_SPEED_PERCENT {
            log::warn!("speed {} exceeds {MAX_SPEED_PERCENT}%, clamping", self.speed);
            MAX_SPEED_PERCENT
        } else {
            self.speed
        };

        [
            left_lo,
            left_hi,
            right_lo,
            right_hi,
            self.left_dir.to_wire(),
            self.right_dir.to_wire(),
            speed as u8,
        ]
    }
}

impl Command for ControlledMove {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        super::SysEx(SysexCommand::ControlledMove as u8, &self.payload()).encode_request()
    }
}

/// Sets the trigger levels and hysteresis of the wheel encoders.
///
/// # Members
///
/// * `left_trigger` - Encoder threshold of the left wheel
/// * `right_trigger` - Encoder threshold of the right wheel
/// * `hysteresis` - Distance between the rising and falling thresholds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OdometryLevels {
    pub left_trigger: i32,
    pub right_trigger: i32,
    pub hysteresis: i32,
}

impl OdometryLevels {
    /// The 6 payload bytes of the frame
    pub fn payload(&self) -> [u8; 6] {
        let [left_lo, left_hi] =
            split_14bit(clamp_14bit("left trigger", self.left_trigger as i64));
        let [right_lo, right_hi] =
            split_14bit(clamp_14bit("right trigger", self.right_trigger as i64));
        let [hyst_lo, hyst_hi] = split_14bit(clamp_14bit("hysteresis", self.hysteresis as i64));

        [left_lo, left_hi, right_lo, right_hi, hyst_lo, hyst_hi]
    }
}

impl Command for OdometryLevels {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        super::SysEx(SysexCommand::OdometryLevels as u8, &self.payload()).encode_request()
    }
}

/// Turns the firmware's odometry debug output (the encoder LEDs) on or off
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OdometryDebug(pub bool);

impl Command for OdometryDebug {
    fn encode_request(self) -> Result<Vec<u8>, crate::errors::DecodeError> {
        super::SysEx(SysexCommand::OdometryDebug as u8, &[self.0 as u8]).encode_request()
    }
}

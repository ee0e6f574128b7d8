//! Contains the model of the Asuro robot: its pin tables, calibration,
//! sensor state and the protocol backends of the different firmware revisions.

pub mod calibration;
pub mod pins;
pub mod protocol;
pub mod sensors;

pub use calibration::{MotorCalibration, TurnCalibration};
pub use pins::PinAssignment;
pub use protocol::{AsuroProtocol, PinOp, ProtocolV1, ProtocolV2, ProtocolVersion};
pub use sensors::{bumper_distance, PortBits, PortState, SensorState};

/// One of the two drive motors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Motor {
    Left,
    Right,
}

/// The direction a motor turns in
///
/// # Variants
///
/// * [Direction::Forward] - Travels as `1`
/// * [Direction::Backward] - Travels as `-1`, which is `0x7F` in a 7-bit byte
#[repr(i8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward = 1,
    Backward = -1,
}

impl Direction {
    /// Negative values go backward, everything else goes forward.
    pub fn from_sign(value: i64) -> Self {
        if value < 0 {
            Self::Backward
        } else {
            Self::Forward
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// The direction as a 7-bit two's complement data byte
    pub fn to_wire(self) -> u8 {
        (self as i8 as u8) & 0x7F
    }
}

/// The five analog sensor channels of the robot
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SensorChannel {
    Bumpers,
    BottomLeft,
    BottomRight,
    SideLeft,
    SideRight,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 5] = [
        Self::Bumpers,
        Self::BottomLeft,
        Self::BottomRight,
        Self::SideLeft,
        Self::SideRight,
    ];

    /// Position of the channel in [SensorChannel::ALL]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The colours the two-colour status LED can show
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LedColor {
    Off,
    Green,
    Red,
    /// Red and green together
    Orange,
}

impl LedColor {
    /// Returns the (red, green) pair for the colour
    pub fn to_red_green(self) -> (bool, bool) {
        match self {
            Self::Off => (false, false),
            Self::Green => (false, true),
            Self::Red => (true, false),
            Self::Orange => (true, true),
        }
    }
}

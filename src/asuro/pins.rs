//! Pin assignment tables. Pins are numbered the Arduino way: digital pins
//! 0-13 over ports 0 and 1, analog channels 0-5.

use serde::{Deserialize, Serialize};

use super::{ProtocolVersion, SensorChannel};

/// The number of digital pins reachable through ports 0 and 1
pub const DIGITAL_PIN_COUNT: u8 = 14;

/// Maps every signal of the robot to a microcontroller pin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    pub status_led_red: u8,
    pub status_led_green: u8,
    pub front_led: u8,

    pub left_motor_speed: u8,
    pub left_motor_forward: u8,
    pub left_motor_backward: u8,

    pub right_motor_speed: u8,
    pub right_motor_forward: u8,
    pub right_motor_backward: u8,

    /// Analog channel of the bumper switch ladder
    pub sensor_bumpers: u8,
    pub sensor_bottom_left: u8,
    pub sensor_bottom_right: u8,
    pub sensor_side_left: u8,
    pub sensor_side_right: u8,

    /// Powers the bumper switch ladder
    #[serde(default)]
    pub bumper_enable: Option<u8>,
    /// Powers the wheel encoder LEDs
    #[serde(default)]
    pub odometry_led: Option<u8>,
    /// Pins switched to PWM mode on initialisation
    #[serde(default)]
    pub pwm_pins: Vec<u8>,
}

impl PinAssignment {
    /// The table of the first firmware, which drives the LEDs through PWM
    pub fn v1() -> Self {
        PinAssignment {
            status_led_red: 2,
            status_led_green: 8,
            front_led: 6,
            left_motor_speed: 9,
            left_motor_forward: 5,
            left_motor_backward: 4,
            right_motor_speed: 10,
            right_motor_forward: 13,
            right_motor_backward: 12,
            sensor_bumpers: 4,
            sensor_bottom_left: 3,
            sensor_bottom_right: 2,
            sensor_side_left: 1,
            sensor_side_right: 0,
            bumper_enable: None,
            odometry_led: None,
            pwm_pins: vec![3, 5, 6, 9, 10, 11],
        }
    }

    /// The table of the odometry firmware, which also switches the bumper
    /// ladder and the wheel encoder LEDs
    pub fn v2() -> Self {
        PinAssignment {
            bumper_enable: Some(3),
            odometry_led: Some(7),
            pwm_pins: vec![9, 10],
            ..Self::v1()
        }
    }

    pub fn for_version(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V1 => Self::v1(),
            ProtocolVersion::V2 => Self::v2(),
        }
    }

    /// Returns the analog channel a sensor is wired to
    pub fn sensor_pin(&self, channel: SensorChannel) -> u8 {
        match channel {
            SensorChannel::Bumpers => self.sensor_bumpers,
            SensorChannel::BottomLeft => self.sensor_bottom_left,
            SensorChannel::BottomRight => self.sensor_bottom_right,
            SensorChannel::SideLeft => self.sensor_side_left,
            SensorChannel::SideRight => self.sensor_side_right,
        }
    }

    /// Returns the sensor wired to an analog channel, if any
    pub fn channel_for_pin(&self, pin: u8) -> Option<SensorChannel> {
        SensorChannel::ALL
            .into_iter()
            .find(|channel| self.sensor_pin(*channel) == pin)
    }

    /// Every pin the session drives as a digital output.
    /// The LEDs are included, even though the first firmware drives them
    /// through analog writes.
    pub fn digital_outputs(&self) -> Vec<u8> {
        let mut pins = vec![
            self.status_led_red,
            self.status_led_green,
            self.front_led,
            self.left_motor_forward,
            self.left_motor_backward,
            self.right_motor_forward,
            self.right_motor_backward,
        ];
        pins.extend(self.bumper_enable);
        pins.extend(self.odometry_led);
        pins
    }
}

//! The firmware revisions of the robot, expressed as protocol backends.
//!
//! A backend only plans pin operations. The session executes them, which
//! keeps the digital port bookkeeping in one place for every revision.

use serde::{Deserialize, Serialize};

use super::{Direction, Motor, PinAssignment, SensorChannel};
use crate::protocol::PinMode;

/// Analog value that turns a PWM output fully on
pub const PWM_MAX: u16 = 255;

/// Selects the backend of a session
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// StandardFirmata with PWM-driven LEDs and 0-255 motor speeds
    V1,
    /// The odometry firmware: percent motor speeds, digital LEDs,
    /// bumper and encoder enable lines
    #[default]
    V2,
}

impl ProtocolVersion {
    pub fn backend(self) -> Box<dyn AsuroProtocol> {
        match self {
            Self::V1 => Box::new(ProtocolV1),
            Self::V2 => Box::new(ProtocolV2),
        }
    }
}

/// A primitive operation on a pin of the board
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinOp {
    Analog { pin: u8, value: u16 },
    /// Sets or clears one pin. Executed as a pin mode change followed by a
    /// write of the whole port.
    Digital { pin: u8, high: bool },
    Mode { pin: u8, mode: PinMode },
    ReportAnalog { pin: u8, enable: bool },
    ReportDigital { port: u8, enable: bool },
}

/// The capabilities every firmware revision provides.
///
/// Controlled moves and odometry go through the shared SysEx commands, so
/// they are not part of the trait.
pub trait AsuroProtocol: Send + Sync + std::fmt::Debug {
    fn version(&self) -> ProtocolVersion;

    /// Operations sent once when the session is initialised
    fn initialise_ops(&self, pins: &PinAssignment) -> Vec<PinOp>;

    /// Turns reporting of the sensor channels on or off
    fn sensor_report_ops(&self, pins: &PinAssignment, enable: bool) -> Vec<PinOp> {
        SensorChannel::ALL
            .into_iter()
            .map(|channel| PinOp::ReportAnalog {
                pin: pins.sensor_pin(channel),
                enable,
            })
            .collect()
    }

    /// Analog value written to a speed pin for an already corrected duty
    fn motor_speed(&self, duty_percent: f64) -> u16;

    /// Sets speed and direction of one motor
    fn motor_ops(
        &self,
        pins: &PinAssignment,
        motor: Motor,
        direction: Direction,
        duty_percent: f64,
    ) -> Vec<PinOp> {
        let (speed, forward, backward) = match motor {
            Motor::Left => (pins.left_motor_speed, pins.left_motor_forward, pins.left_motor_backward),
            Motor::Right => (
                pins.right_motor_speed,
                pins.right_motor_forward,
                pins.right_motor_backward,
            ),
        };
        let ahead = direction == Direction::Forward;

        vec![
            PinOp::Analog {
                pin: speed,
                value: self.motor_speed(duty_percent),
            },
            PinOp::Digital { pin: forward, high: ahead },
            PinOp::Digital { pin: backward, high: !ahead },
        ]
    }

    fn status_led_ops(&self, pins: &PinAssignment, red: bool, green: bool) -> Vec<PinOp>;

    fn front_led_ops(&self, pins: &PinAssignment, on: bool) -> Vec<PinOp>;

    /// Operations sent before the transport is released
    fn shutdown_ops(&self, _pins: &PinAssignment) -> Vec<PinOp> {
        Vec::new()
    }
}

fn report_digital_ports(enable: bool) -> [PinOp; 2] {
    [
        PinOp::ReportDigital { port: 0, enable },
        PinOp::ReportDigital { port: 1, enable },
    ]
}

fn pwm(on: bool) -> u16 {
    if on {
        PWM_MAX
    } else {
        0
    }
}

/// The first firmware: plain StandardFirmata.
#[derive(Copy, Clone, Debug, Default)]
pub struct ProtocolV1;

impl AsuroProtocol for ProtocolV1 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn initialise_ops(&self, pins: &PinAssignment) -> Vec<PinOp> {
        let mut ops: Vec<PinOp> = pins
            .pwm_pins
            .iter()
            .map(|pin| PinOp::Mode { pin: *pin, mode: PinMode::Pwm })
            .collect();
        ops.extend(self.sensor_report_ops(pins, true));
        ops.extend(report_digital_ports(true));
        ops
    }

    /// Maps a percentage onto the 0-255 PWM range
    fn motor_speed(&self, duty_percent: f64) -> u16 {
        if duty_percent.is_nan() || duty_percent <= 0.0 {
            return 0;
        }
        if duty_percent >= 100.0 {
            return PWM_MAX;
        }
        (duty_percent * 2.55) as u16
    }

    fn status_led_ops(&self, pins: &PinAssignment, red: bool, green: bool) -> Vec<PinOp> {
        vec![
            PinOp::Analog { pin: pins.status_led_red, value: pwm(red) },
            PinOp::Analog { pin: pins.status_led_green, value: pwm(green) },
        ]
    }

    fn front_led_ops(&self, pins: &PinAssignment, on: bool) -> Vec<PinOp> {
        vec![PinOp::Analog { pin: pins.front_led, value: pwm(on) }]
    }
}

/// The odometry firmware.
#[derive(Copy, Clone, Debug, Default)]
pub struct ProtocolV2;

impl AsuroProtocol for ProtocolV2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn initialise_ops(&self, pins: &PinAssignment) -> Vec<PinOp> {
        let mut ops: Vec<PinOp> = pins
            .pwm_pins
            .iter()
            .map(|pin| PinOp::Mode { pin: *pin, mode: PinMode::Pwm })
            .collect();
        ops.extend(
            pins.digital_outputs()
                .into_iter()
                .map(|pin| PinOp::Mode { pin, mode: PinMode::Output }),
        );
        ops.extend(self.sensor_report_ops(pins, true));
        ops.extend(pins.bumper_enable.map(|pin| PinOp::Digital { pin, high: true }));
        ops.extend(pins.odometry_led.map(|pin| PinOp::Digital { pin, high: true }));
        ops.extend(report_digital_ports(true));
        ops
    }

    /// The firmware takes the percentage as is
    fn motor_speed(&self, duty_percent: f64) -> u16 {
        duty_percent.round() as u16
    }

    fn status_led_ops(&self, pins: &PinAssignment, red: bool, green: bool) -> Vec<PinOp> {
        vec![
            PinOp::Digital { pin: pins.status_led_red, high: red },
            PinOp::Digital { pin: pins.status_led_green, high: green },
        ]
    }

    fn front_led_ops(&self, pins: &PinAssignment, on: bool) -> Vec<PinOp> {
        vec![PinOp::Digital { pin: pins.front_led, high: on }]
    }

    fn shutdown_ops(&self, pins: &PinAssignment) -> Vec<PinOp> {
        pins.bumper_enable
            .into_iter()
            .chain(pins.odometry_led)
            .map(|pin| PinOp::Digital { pin, high: false })
            .collect()
    }
}

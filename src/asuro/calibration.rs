use serde::{Deserialize, Serialize};

use super::{Direction, Motor};
use crate::commands::ControlledMove;

/// Per-motor speed correction derived from a left/right bias and a global
/// scale.
///
/// One factor always equals the scale. The other one is reduced by the
/// magnitude of the bias: a positive bias slows the right motor, a negative
/// bias slows the left motor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MotorCalibration {
    bias: f64,
    scale: f64,
    left_factor: f64,
    right_factor: f64,
}

impl MotorCalibration {
    /// No bias, full speed
    pub const NEUTRAL: MotorCalibration = MotorCalibration {
        bias: 0.0,
        scale: 1.0,
        left_factor: 1.0,
        right_factor: 1.0,
    };

    /// Builds the calibration. The bias is clamped to `[-1, 1]` and the scale
    /// to `[0, 1]`. Values that are not numbers count as zero.
    pub fn new(bias: f64, scale: f64) -> Self {
        let bias = if bias.is_nan() { 0.0 } else { bias.clamp(-1.0, 1.0) };
        let scale = if scale.is_nan() { 0.0 } else { scale.clamp(0.0, 1.0) };

        let reduced = scale * (1.0 - bias.abs());
        let (left_factor, right_factor) = if bias >= 0.0 {
            (scale, reduced)
        } else {
            (reduced, scale)
        };

        MotorCalibration {
            bias,
            scale,
            left_factor,
            right_factor,
        }
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn factor(&self, motor: Motor) -> f64 {
        match motor {
            Motor::Left => self.left_factor,
            Motor::Right => self.right_factor,
        }
    }

    /// Scales a duty percentage by the factor of a motor
    pub fn apply(&self, motor: Motor, percent: f64) -> f64 {
        percent * self.factor(motor)
    }
}

impl Default for MotorCalibration {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Wheel encoder steps needed to pivot the robot in place.
///
/// The defaults were measured on one robot. Other units will need their own
/// values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnCalibration {
    pub steps_90: u32,
    pub steps_180: u32,
    pub steps_360: u32,
    /// Motor speed used for turns, in percent
    pub speed: u32,
}

impl Default for TurnCalibration {
    fn default() -> Self {
        TurnCalibration {
            steps_90: 26,
            steps_180: 53,
            steps_360: 110,
            speed: 40,
        }
    }
}

impl TurnCalibration {
    /// Steps for a turn of `degrees`, ignoring its sign
    pub fn steps_for(&self, degrees: i64) -> u32 {
        match degrees.unsigned_abs() {
            90 => self.steps_90,
            180 => self.steps_180,
            360 => self.steps_360,
            d => (d as u128 * self.steps_360 as u128 / 360).min(u32::MAX as u128) as u32,
        }
    }

    /// Builds the move that pivots the robot by `degrees`. Positive angles run
    /// the left motor forward and the right motor backward.
    pub fn turn(&self, degrees: i64) -> ControlledMove {
        let steps = self.steps_for(degrees);
        let dir = Direction::from_sign(degrees);

        ControlledMove {
            left_steps: steps,
            right_steps: steps,
            left_dir: dir,
            right_dir: dir.opposite(),
            speed: self.speed,
        }
    }
}

//! Session configuration, read from TOML.
//!
//! ```toml
//! protocol = "v2"
//! stop_sensor_reporting_on_pause = false
//!
//! [serial]
//! port = "/dev/rfcomm0"
//! baud_rate = 57600
//!
//! [turn]
//! steps_90 = 28
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::asuro::pins::DIGITAL_PIN_COUNT;
use crate::asuro::{PinAssignment, ProtocolVersion, TurnCalibration};
use crate::errors::ConfigError;

/// The default timeout for serial writes in milliseconds
pub const SERIAL_TIMEOUT_MS: u64 = 3000;

/// How the serial device is opened
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path. When missing, the first discovered port is used.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: None,
            baud_rate: crate::protocol::DEFAULT_BAUD_RATE,
            timeout_ms: SERIAL_TIMEOUT_MS,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything a session needs besides its transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub protocol: ProtocolVersion,
    /// Whether `pause` also turns analog sensor reporting off.
    /// Firmware revisions disagree on this, so it is left to the user.
    pub stop_sensor_reporting_on_pause: bool,
    /// Pin table override. Defaults to the table of `protocol`.
    pub pins: Option<PinAssignment>,
    pub turn: TurnCalibration,
    pub serial: SerialConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            protocol: ProtocolVersion::default(),
            stop_sensor_reporting_on_pause: true,
            pins: None,
            turn: TurnCalibration::default(),
            serial: SerialConfig::default(),
        }
    }
}

impl SessionConfig {
    /// A default configuration for a given firmware revision
    pub fn for_version(protocol: ProtocolVersion) -> Self {
        SessionConfig {
            protocol,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    /// The pin table in effect
    pub fn pin_assignment(&self) -> PinAssignment {
        self.pins
            .clone()
            .unwrap_or_else(|| PinAssignment::for_version(self.protocol))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = self.pin_assignment();

        if let Some(pin) = pins
            .digital_outputs()
            .into_iter()
            .find(|pin| *pin >= DIGITAL_PIN_COUNT)
        {
            return Err(ConfigError::Invalid(format!(
                "digital pin {pin} is outside ports 0 and 1"
            )));
        }

        let sensors = [
            pins.sensor_bumpers,
            pins.sensor_bottom_left,
            pins.sensor_bottom_right,
            pins.sensor_side_left,
            pins.sensor_side_right,
        ];
        if let Some(pin) = sensors.iter().find(|pin| **pin > 0x0F) {
            return Err(ConfigError::Invalid(format!(
                "analog channel {pin} cannot be reported"
            )));
        }

        if self.turn.steps_90 == 0 || self.turn.steps_180 == 0 || self.turn.steps_360 == 0 {
            return Err(ConfigError::Invalid("turn steps must not be zero".to_string()));
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud rate must not be zero".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.pin_assignment(), PinAssignment::v2());
    }

    #[test]
    fn partial_document() {
        let config = SessionConfig::from_toml_str(
            r#"
            protocol = "v1"
            stop_sensor_reporting_on_pause = false

            [turn]
            steps_90 = 28

            [serial]
            port = "/dev/rfcomm0"
            "#,
        )
        .unwrap();

        assert_eq!(config.protocol, ProtocolVersion::V1);
        assert!(!config.stop_sensor_reporting_on_pause);
        assert_eq!(config.turn.steps_90, 28);
        assert_eq!(config.turn.steps_180, 53);
        assert_eq!(config.serial.port.as_deref(), Some("/dev/rfcomm0"));
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.pin_assignment(), PinAssignment::v1());
    }

    #[test]
    fn rejects_bad_pins() {
        let mut config = SessionConfig::default();
        let mut pins = PinAssignment::v2();
        pins.front_led = 20;
        config.pins = Some(pins);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_protocol() {
        assert!(matches!(
            SessionConfig::from_toml_str("protocol = \"v9\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "protocol = \"v1\"").unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.protocol, ProtocolVersion::V1);
    }
}

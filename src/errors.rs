use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO Error")]
    IoError(#[from] std::io::Error),
    #[error("SysEx payload byte {1:#04x} at offset {0} does not fit in 7 bits")]
    NotSevenBit(usize, u8),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO Error")]
    IoError(#[from] std::io::Error),
    #[error("Serialport Error")]
    SerialportError(#[from] serialport::Error),
    #[error("No serial port configured or discovered")]
    NoPortFound,
    #[error("Invalid session configuration")]
    ConfigError(#[from] ConfigError),
}

/// Errors returned by the command surface of a session.
///
/// Transport failures are not in here: they are logged and swallowed so that
/// the session stays usable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("The session has not been initialised")]
    NotInitialized,
    #[error("The session has already been destroyed")]
    AlreadyDestroyed,
    #[error("Pin {0} is not a digital pin of ports 0 or 1")]
    InvalidPin(u8),
    #[error("Bumper index {0} is out of range")]
    InvalidBumper(u8),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error")]
    IoError(#[from] std::io::Error),
    #[error("Could not parse configuration")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

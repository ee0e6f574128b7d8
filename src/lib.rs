//! A Firmata driver for the Asuro robot.
//!
//! The [protocol] and [commands] modules implement the wire format, [asuro]
//! models the robot and its firmware revisions, and [devices] opens a serial
//! port and runs a session over it.

pub mod asuro;
pub mod commands;
pub mod config;
pub mod devices;
pub mod errors;
pub mod protocol;

pub use config::SessionConfig;
pub use devices::{AsuroSession, SerialSession, SessionState};

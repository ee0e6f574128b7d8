//! State shared between the session and the listener task.
//!
//! Both structures only hold atomics, so the listener can update them while
//! the session reads or writes them without any locking.

use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use bitflags::bitflags;

use super::{PinAssignment, SensorChannel};
use crate::errors::SessionError;
use crate::protocol::MAX_ANALOG_SAMPLE;

/// The number of switches on the bumper ladder
pub const BUMPER_COUNT: u8 = 6;

/// One bit per bumper switch
const BUMPER_MASK: u32 = (1 << BUMPER_COUNT) - 1;

bitflags! {
    /// The bits of one 8-pin digital port
    pub struct PortBits: u8 {
        const PIN0 = 0b00000001;
        const PIN1 = 0b00000010;
        const PIN2 = 0b00000100;
        const PIN3 = 0b00001000;
        const PIN4 = 0b00010000;
        const PIN5 = 0b00100000;
        const PIN6 = 0b01000000;
        const PIN7 = 0b10000000;
    }
}

impl PortBits {
    /// Locates a digital pin: returns its port and its bit in that port.
    /// Only ports 0 and 1 (pins 0-13) exist on the robot.
    pub fn locate(pin: u8) -> Result<(u8, PortBits), SessionError> {
        if pin >= super::pins::DIGITAL_PIN_COUNT {
            return Err(SessionError::InvalidPin(pin));
        }
        Ok((pin / 8, PortBits::from_bits_truncate(1 << (pin % 8))))
    }
}

/// Last known value of the two digital ports.
#[derive(Debug, Default)]
pub struct PortState {
    ports: [AtomicU8; 2],
}

impl PortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears a single pin and returns its port with the new port
    /// value. Other bits of the port are left alone.
    pub fn set_pin(&self, pin: u8, high: bool) -> Result<(u8, PortBits), SessionError> {
        let (port, bit) = PortBits::locate(pin)?;
        let cell = &self.ports[port as usize];

        let previous = if high {
            cell.fetch_or(bit.bits(), Ordering::AcqRel)
        } else {
            cell.fetch_and(!bit.bits(), Ordering::AcqRel)
        };

        let mut value = PortBits::from_bits_truncate(previous);
        value.set(bit, high);
        Ok((port, value))
    }

    /// The value of a port, empty for ports that do not exist
    pub fn port(&self, port: u8) -> PortBits {
        self.ports
            .get(port as usize)
            .map(|p| PortBits::from_bits_truncate(p.load(Ordering::Acquire)))
            .unwrap_or_else(PortBits::empty)
    }

    /// Shadow value of a single pin
    pub fn pin(&self, pin: u8) -> Result<bool, SessionError> {
        let (port, bit) = PortBits::locate(pin)?;
        Ok(self.port(port).contains(bit))
    }

    /// Overwrites a port with the value the board reported
    pub fn store_port(&self, port: u8, value: u8) {
        if let Some(cell) = self.ports.get(port as usize) {
            cell.store(value, Ordering::Release);
        }
    }

    pub fn reset(&self) {
        for port in &self.ports {
            port.store(0, Ordering::Release);
        }
    }
}

/// Last decoded sample of every sensor channel.
#[derive(Debug, Default)]
pub struct SensorState {
    samples: [AtomicU16; 5],
}

impl SensorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a sample reported for an analog pin. Samples above the 10-bit
    /// range and pins with no sensor are dropped.
    pub fn record(&self, pins: &PinAssignment, pin: u8, raw: u16) -> Option<SensorChannel> {
        if raw > MAX_ANALOG_SAMPLE {
            return None;
        }

        let channel = pins.channel_for_pin(pin)?;
        self.samples[channel.index()].store(raw, Ordering::Relaxed);
        Some(channel)
    }

    pub fn get(&self, channel: SensorChannel) -> u16 {
        self.samples[channel.index()].load(Ordering::Relaxed)
    }

    /// The bumper ladder reading converted by [bumper_distance]
    pub fn bumper_distance(&self) -> f64 {
        bumper_distance(self.get(SensorChannel::Bumpers))
    }

    /// Whether bumper switch `index` is closed, read from the bits of the
    /// whole part of [SensorState::bumper_distance]. Values wider than the
    /// switch bits, including the one before any sample arrived, close no
    /// switch.
    pub fn bumper_pressed(&self, index: u8) -> Result<bool, SessionError> {
        if index >= BUMPER_COUNT {
            return Err(SessionError::InvalidBumper(index));
        }

        let switches = self.bumper_distance() as u32;
        if switches > BUMPER_MASK {
            return Ok(false);
        }
        Ok((switches >> index) & 1 == 1)
    }

    pub fn reset(&self) {
        for sample in &self.samples {
            sample.store(0, Ordering::Relaxed);
        }
    }
}

/// Converts a raw reading of the bumper divider into the switch/distance
/// value the robot programs were calibrated against.
///
/// The correction constants are empirical and must not be changed. Each step
/// tests the value already adjusted by the previous one. A raw value of 0
/// counts as 1.
pub fn bumper_distance(raw: u16) -> f64 {
    let raw = raw.max(1) as f64;

    let mut value = (1023.0 / raw - 1.0) * 64.0;
    if value > 0.2 {
        value += 2.3;
    }
    if value > 38.0 {
        value += 0.3;
    }
    if value > 55.0 {
        value += 0.5;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_at_full_scale_is_zero() {
        assert_eq!(bumper_distance(1023), 0.0);
    }

    #[test]
    fn distance_corrections_stack() {
        // (1023/512 - 1) * 64 = 63.875, then +2.3 +0.3 +0.5
        assert!((bumper_distance(512) - 66.975).abs() < 1e-9);
        // 0.19 after the first step: no correction at all
        assert!(bumper_distance(1020) < 0.2);
        assert!(bumper_distance(0).is_finite());
    }

    #[test]
    fn port_read_modify_write() {
        let ports = PortState::new();
        ports.store_port(1, 0b0010_0000);

        let (port, value) = ports.set_pin(9, true).unwrap();
        assert_eq!(port, 1);
        assert_eq!(value.bits(), 0b0010_0010);
        assert_eq!(ports.port(1).bits(), 0b0010_0010);

        let (_, value) = ports.set_pin(13, false).unwrap();
        assert_eq!(value.bits(), 0b0000_0010);
        assert!(ports.pin(9).unwrap());
        assert!(!ports.pin(13).unwrap());
    }

    #[test]
    fn set_pin_is_idempotent() {
        let ports = PortState::new();
        let first = ports.set_pin(4, true).unwrap();
        let second = ports.set_pin(4, true).unwrap();
        assert_eq!(first, second);
        assert_eq!(ports.port(0), PortBits::PIN4);
    }

    #[test]
    fn invalid_pins() {
        let ports = PortState::new();
        assert_eq!(ports.set_pin(14, true), Err(SessionError::InvalidPin(14)));
    }

    #[test]
    fn samples_and_bumpers() {
        let pins = PinAssignment::v1();
        let sensors = SensorState::new();

        assert_eq!(sensors.record(&pins, 3, 700), Some(SensorChannel::BottomLeft));
        assert_eq!(sensors.get(SensorChannel::BottomLeft), 700);

        // Out of range and unmapped samples are dropped
        assert_eq!(sensors.record(&pins, 3, 1024), None);
        assert_eq!(sensors.record(&pins, 5, 10), None);
        assert_eq!(sensors.get(SensorChannel::BottomLeft), 700);

        // 3.77 -> switches 0 and 1
        sensors.record(&pins, 4, 1000);
        assert!(sensors.bumper_pressed(0).unwrap());
        assert!(sensors.bumper_pressed(1).unwrap());
        assert!(!sensors.bumper_pressed(2).unwrap());
        assert_eq!(sensors.bumper_pressed(6), Err(SessionError::InvalidBumper(6)));
    }

    #[test]
    fn no_bumpers_before_the_first_sample() {
        let sensors = SensorState::new();
        assert!(sensors.bumper_distance() > BUMPER_MASK as f64);
        for index in 0..BUMPER_COUNT {
            assert_eq!(sensors.bumper_pressed(index), Ok(false));
        }
    }

    #[test]
    fn distances_past_the_switch_bits_press_nothing() {
        let pins = PinAssignment::v1();
        let sensors = SensorState::new();

        // 66.975 does not fit in six bits
        sensors.record(&pins, 4, 512);
        for index in 0..BUMPER_COUNT {
            assert_eq!(sensors.bumper_pressed(index), Ok(false));
        }

        // 63.57 still does, every switch closed
        sensors.record(&pins, 4, 526);
        assert!((0..BUMPER_COUNT).all(|i| sensors.bumper_pressed(i) == Ok(true)));
    }
}

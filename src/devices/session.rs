//! A session with one robot over one transport.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_serial::SerialStream;
use tokio_stream::wrappers::BroadcastStream;

use super::listener::{self, SharedState};
use crate::asuro::{
    AsuroProtocol, Direction, LedColor, Motor, MotorCalibration, PinAssignment, PinOp,
    ProtocolVersion, SensorChannel,
};
use crate::commands::{
    AnalogWrite, Command, ControlledMove, DigitalWrite, OdometryDebug, OdometryLevels,
    ReportAnalogPin, ReportDigitalPort, ReportFirmware, SetPinMode,
};
use crate::config::SessionConfig;
use crate::errors::{ConfigError, DecodeError, DeviceError, SessionError};
use crate::protocol::{InboundMessage, PinMode};

/// Decoded messages buffered per subscriber
const EVENT_CAPACITY: usize = 64;

/// A session over a serial port
pub type SerialSession = AsuroSession<ReadHalf<SerialStream>, WriteHalf<SerialStream>>;

/// Lifecycle of a session
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Paused,
    /// Terminal: the transport has been released
    Destroyed,
}

/// The representation of a robot connected over a byte stream.
///
/// Writes go through `W` from the caller's task. Reads from `R` are handled
/// by a listener task spawned on [AsuroSession::initialise], which keeps the
/// sensor and port state up to date.
pub struct AsuroSession<R, W> {
    config: SessionConfig,
    pins: PinAssignment,
    backend: Box<dyn AsuroProtocol>,
    state: SessionState,
    reader: Option<R>,
    writer: Option<W>,
    listener: Option<JoinHandle<()>>,
    shared: Arc<SharedState>,
    events: broadcast::Sender<InboundMessage>,
    calibration: MotorCalibration,
    reporting_sensors: bool,
}

impl SerialSession {
    /// Opens the configured serial port, or the first one discovered.
    pub fn open(config: SessionConfig) -> Result<Self, DeviceError> {
        config.validate()?;
        let path = super::resolve_port(&config.serial)?;
        let stream = super::open_serial(&path, &config.serial)?;
        Ok(Self::from_stream(config, stream)?)
    }
}

impl<S> AsuroSession<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Splits a bidirectional stream into the listener and writer halves
    pub fn from_stream(config: SessionConfig, stream: S) -> Result<Self, ConfigError> {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(config, reader, writer)
    }
}

impl<R, W> AsuroSession<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    /// Builds a session over a transport. The configuration is validated
    /// here so that initialisation cannot fail on a bad pin table.
    pub fn new(config: SessionConfig, reader: R, writer: W) -> Result<Self, ConfigError> {
        config.validate()?;

        let pins = config.pin_assignment();
        let backend = config.protocol.backend();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(AsuroSession {
            config,
            pins,
            backend,
            state: SessionState::Uninitialized,
            reader: Some(reader),
            writer: Some(writer),
            listener: None,
            shared: Arc::new(SharedState::default()),
            events,
            calibration: MotorCalibration::NEUTRAL,
            reporting_sensors: false,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn version(&self) -> ProtocolVersion {
        self.backend.version()
    }

    pub fn calibration(&self) -> MotorCalibration {
        self.calibration
    }

    /// The sensor and port state, for readers on other tasks
    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    /// A stream of every message decoded from the board from now on
    pub fn events(&self) -> BroadcastStream<InboundMessage> {
        BroadcastStream::new(self.events.subscribe())
    }

    // # Lifecycle

    /// Starts the listener and configures the board. Calling it again is a no-op.
    pub async fn initialise(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed => return Err(SessionError::AlreadyDestroyed),
            SessionState::Active | SessionState::Paused => return Ok(()),
            SessionState::Uninitialized => {}
        }

        self.shared.sensors.reset();
        self.shared.ports.reset();

        if let Some(reader) = self.reader.take() {
            self.listener = Some(listener::spawn(
                reader,
                self.pins.clone(),
                Arc::clone(&self.shared),
                self.events.clone(),
            ));
        }

        let ops = self.backend.initialise_ops(&self.pins);
        self.execute(ops).await?;
        self.reporting_sensors = true;
        self.calibration = MotorCalibration::NEUTRAL;
        self.state = SessionState::Active;

        log::info!("Asuro session initialised ({:?})", self.backend.version());
        Ok(())
    }

    /// Initialises if needed and turns sensor reporting back on.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed => return Err(SessionError::AlreadyDestroyed),
            SessionState::Uninitialized => self.initialise().await?,
            SessionState::Active | SessionState::Paused => {}
        }

        self.set_sensor_reporting(true).await?;
        self.state = SessionState::Active;
        Ok(())
    }

    /// Stops the motors, switches the LEDs off and resets the calibration.
    /// Sensor reporting is turned off as well when the configuration asks
    /// for it.
    pub async fn pause(&mut self) -> Result<(), SessionError> {
        self.ensure_initialised()?;

        self.quiesce().await?;
        if self.config.stop_sensor_reporting_on_pause {
            self.set_sensor_reporting(false).await?;
        }
        self.state = SessionState::Paused;

        log::info!("Asuro session paused");
        Ok(())
    }

    /// Leaves the robot quiescent and releases the transport.
    pub async fn destroy(&mut self) -> Result<(), SessionError> {
        self.shutdown(false).await
    }

    /// Like [AsuroSession::destroy], but also turns sensor reporting off
    /// before the transport is released.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.shutdown(true).await
    }

    /// Probes the transport by asking for the firmware version. Always false
    /// outside the active and paused states, without writing anything.
    pub async fn is_alive(&mut self) -> bool {
        if self.ensure_initialised().is_err() {
            return false;
        }
        self.try_send(ReportFirmware).await.is_ok()
    }

    /// Asks the board to report its firmware. The answer arrives on
    /// [AsuroSession::events].
    pub async fn report_firmware_version(&mut self) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.send_command(ReportFirmware).await;
        Ok(())
    }

    // # Motors

    pub async fn move_left_motor_forward(&mut self, percent: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.drive(Motor::Left, Direction::Forward, percent).await
    }

    pub async fn move_left_motor_backward(&mut self, percent: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.drive(Motor::Left, Direction::Backward, percent).await
    }

    pub async fn move_right_motor_forward(&mut self, percent: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.drive(Motor::Right, Direction::Forward, percent).await
    }

    pub async fn move_right_motor_backward(&mut self, percent: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.drive(Motor::Right, Direction::Backward, percent).await
    }

    pub async fn move_forward(&mut self, percent: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.drive(Motor::Left, Direction::Forward, percent).await?;
        self.drive(Motor::Right, Direction::Forward, percent).await
    }

    pub async fn move_backward(&mut self, percent: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.drive(Motor::Left, Direction::Backward, percent).await?;
        self.drive(Motor::Right, Direction::Backward, percent).await
    }

    pub async fn stop_left_motor(&mut self) -> Result<(), SessionError> {
        self.move_left_motor_forward(0).await
    }

    pub async fn stop_right_motor(&mut self) -> Result<(), SessionError> {
        self.move_right_motor_forward(0).await
    }

    pub async fn stop_all_movements(&mut self) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.stop_motors().await
    }

    /// Sets the speed correction applied to every later motor command.
    /// The bias is clamped to `[-1, 1]`, the scale to `[0, 1]`.
    pub async fn set_motor_calibration(&mut self, bias: f64, scale: f64) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.calibration = MotorCalibration::new(bias, scale);
        log::debug!(
            "Motor calibration: left {:.3}, right {:.3}",
            self.calibration.factor(Motor::Left),
            self.calibration.factor(Motor::Right)
        );
        Ok(())
    }

    /// Pivots the robot in place. Positive angles turn clockwise.
    pub async fn turn_angle(&mut self, degrees: i32) -> Result<(), SessionError> {
        self.ensure_active().await?;
        let command = self.config.turn.turn(degrees as i64);
        self.send_command(command).await;
        Ok(())
    }

    /// Drives each wheel a number of encoder steps at `speed` percent.
    pub async fn move_motors_steps_speed(
        &mut self,
        left_steps: u32,
        right_steps: u32,
        left_dir: Direction,
        right_dir: Direction,
        speed: u32,
    ) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.send_command(ControlledMove {
            left_steps,
            right_steps,
            left_dir,
            right_dir,
            speed,
        })
        .await;
        Ok(())
    }

    /// Like [AsuroSession::move_motors_steps_speed] with the direction of each
    /// wheel taken from the sign of its step count.
    pub async fn move_steps(
        &mut self,
        left_steps: i32,
        right_steps: i32,
        speed: i32,
    ) -> Result<(), SessionError> {
        self.move_motors_steps_speed(
            left_steps.unsigned_abs(),
            right_steps.unsigned_abs(),
            Direction::from_sign(left_steps as i64),
            Direction::from_sign(right_steps as i64),
            speed.max(0) as u32,
        )
        .await
    }

    // # Odometry

    /// Sets the encoder trigger levels. Each value is clamped to 14 bits.
    pub async fn configure_odometry(
        &mut self,
        left_trigger: i32,
        right_trigger: i32,
        hysteresis: i32,
    ) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.send_command(OdometryLevels {
            left_trigger,
            right_trigger,
            hysteresis,
        })
        .await;
        Ok(())
    }

    pub async fn set_odometry_debug(&mut self, on: bool) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.send_command(OdometryDebug(on)).await;
        Ok(())
    }

    // # LEDs

    pub async fn set_status_led_color(&mut self, red: bool, green: bool) -> Result<(), SessionError> {
        self.ensure_active().await?;
        let ops = self.backend.status_led_ops(&self.pins, red, green);
        self.execute(ops).await
    }

    pub async fn set_status_led(&mut self, color: LedColor) -> Result<(), SessionError> {
        let (red, green) = color.to_red_green();
        self.set_status_led_color(red, green).await
    }

    pub async fn set_front_led(&mut self, on: bool) -> Result<(), SessionError> {
        self.ensure_active().await?;
        let ops = self.backend.front_led_ops(&self.pins, on);
        self.execute(ops).await
    }

    /// Sets or clears one digital pin, re-sending its whole port
    pub async fn set_digital_pin(&mut self, pin: u8, high: bool) -> Result<(), SessionError> {
        self.ensure_active().await?;
        self.write_digital_pin(pin, high).await
    }

    // # Sensors

    /// The last sample of a sensor channel
    pub fn get_sensor_value(&self, channel: SensorChannel) -> Result<u16, SessionError> {
        self.ensure_initialised()?;
        Ok(self.shared.sensors.get(channel))
    }

    /// Whether bumper switch `index` (0-5) is closed
    pub fn get_bumper_status(&self, index: u8) -> Result<bool, SessionError> {
        self.ensure_initialised()?;
        self.shared.sensors.bumper_pressed(index)
    }

    pub fn bumper_distance(&self) -> Result<f64, SessionError> {
        self.ensure_initialised()?;
        Ok(self.shared.sensors.bumper_distance())
    }

    /// The last known level of a digital pin
    pub fn digital_pin(&self, pin: u8) -> Result<bool, SessionError> {
        self.ensure_initialised()?;
        self.shared.ports.pin(pin)
    }

    // # Internals

    fn ensure_initialised(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Uninitialized => Err(SessionError::NotInitialized),
            SessionState::Destroyed => Err(SessionError::AlreadyDestroyed),
            SessionState::Active | SessionState::Paused => Ok(()),
        }
    }

    /// Commands on a paused session resume it.
    async fn ensure_active(&mut self) -> Result<(), SessionError> {
        self.ensure_initialised()?;

        if self.state == SessionState::Paused {
            self.set_sensor_reporting(true).await?;
            self.state = SessionState::Active;
            log::info!("Asuro session resumed");
        }
        Ok(())
    }

    async fn drive(&mut self, motor: Motor, direction: Direction, percent: i32) -> Result<(), SessionError> {
        let duty = self.calibration.apply(motor, percent as f64);
        let ops = self.backend.motor_ops(&self.pins, motor, direction, duty);
        self.execute(ops).await
    }

    async fn stop_motors(&mut self) -> Result<(), SessionError> {
        self.drive(Motor::Left, Direction::Forward, 0).await?;
        self.drive(Motor::Right, Direction::Forward, 0).await
    }

    /// Motors stopped, LEDs off, calibration neutral
    async fn quiesce(&mut self) -> Result<(), SessionError> {
        self.stop_motors().await?;

        let mut ops = self.backend.status_led_ops(&self.pins, false, false);
        ops.extend(self.backend.front_led_ops(&self.pins, false));
        self.execute(ops).await?;

        self.calibration = MotorCalibration::NEUTRAL;
        Ok(())
    }

    async fn set_sensor_reporting(&mut self, enable: bool) -> Result<(), SessionError> {
        if self.reporting_sensors == enable {
            return Ok(());
        }
        self.reporting_sensors = enable;

        let ops = self.backend.sensor_report_ops(&self.pins, enable);
        self.execute(ops).await
    }

    async fn shutdown(&mut self, stop_reporting: bool) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed => return Err(SessionError::AlreadyDestroyed),
            SessionState::Uninitialized => {}
            SessionState::Active | SessionState::Paused => {
                self.quiesce().await?;

                let ops = self.backend.shutdown_ops(&self.pins);
                self.execute(ops).await?;

                if stop_reporting {
                    self.set_sensor_reporting(false).await?;
                }
            }
        }

        self.calibration = MotorCalibration::NEUTRAL;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.reader = None;
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                log::debug!("Error closing the transport: {e}");
            }
        }
        self.state = SessionState::Destroyed;

        log::info!("Asuro session destroyed");
        Ok(())
    }

    async fn execute(&mut self, ops: Vec<PinOp>) -> Result<(), SessionError> {
        for op in ops {
            match op {
                PinOp::Analog { pin, value } => self.send_command(AnalogWrite(pin, value)).await,
                PinOp::Digital { pin, high } => self.write_digital_pin(pin, high).await?,
                PinOp::Mode { pin, mode } => self.send_command(SetPinMode(pin, mode)).await,
                PinOp::ReportAnalog { pin, enable } => {
                    self.send_command(ReportAnalogPin(pin, enable)).await
                }
                PinOp::ReportDigital { port, enable } => {
                    self.send_command(ReportDigitalPort(port, enable)).await
                }
            }
        }
        Ok(())
    }

    /// Updates the port shadow, then sends the pin mode and the whole port.
    async fn write_digital_pin(&mut self, pin: u8, high: bool) -> Result<(), SessionError> {
        let (port, value) = self.shared.ports.set_pin(pin, high)?;
        self.send_command(SetPinMode(pin, PinMode::Output)).await;
        self.send_command(DigitalWrite(port, value.bits())).await;
        Ok(())
    }

    /// Sends a command, logging and dropping any failure
    async fn send_command<C: Command>(&mut self, command: C) {
        if let Err(e) = self.try_send(command).await {
            log::debug!("Firmata serial error, cannot send message: {e}");
        }
    }

    /// Sends a command
    async fn try_send<C: Command>(&mut self, command: C) -> Result<(), DecodeError> {
        // Encode the command
        let encoded = command.encode_request()?;
        let timeout = self.config.serial.timeout();

        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => {
                return Err(DecodeError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "transport released",
                )))
            }
        };

        log::trace!("Write to port: {encoded:02x?}");

        // Write the command to the transport without blocking forever on a
        // stalled link
        let write = async {
            writer.write_all(&encoded).await?;
            writer.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DecodeError::IoError(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "write timed out",
            ))),
        }
    }
}

impl<R, W> Drop for AsuroSession<R, W> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

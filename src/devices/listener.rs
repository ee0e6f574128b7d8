//! The task that reads the transport and keeps the sensor state current.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::asuro::{PinAssignment, PortState, SensorState};
use crate::protocol::{FrameDecoder, InboundMessage};

/// Digital ports carry 8 pins, anything above is noise
const MAX_PORT_VALUE: u16 = 0xFF;

/// State written by the listener and read by the session
#[derive(Debug, Default)]
pub struct SharedState {
    pub sensors: SensorState,
    pub ports: PortState,
}

/// Spawns the listener on the current tokio runtime. The task ends when the
/// transport reaches EOF or fails.
pub fn spawn<R>(
    reader: R,
    pins: PinAssignment,
    shared: Arc<SharedState>,
    events: broadcast::Sender<InboundMessage>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let listener = Listener {
        pins,
        shared,
        events,
        decoder: FrameDecoder::new(),
    };
    tokio::spawn(listener.run(reader))
}

struct Listener {
    pins: PinAssignment,
    shared: Arc<SharedState>,
    events: broadcast::Sender<InboundMessage>,
    decoder: FrameDecoder,
}

impl Listener {
    async fn run<R: AsyncRead + Unpin>(mut self, mut reader: R) {
        let mut buf = [0u8; 256];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    log::info!("Transport closed, no more sensor updates");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    log::debug!("Transport read failed, no more sensor updates: {e}");
                    break;
                }
            };
            log::trace!("Read from port: {:02x?}", &buf[..n]);

            for message in self.decoder.feed(&buf[..n]) {
                self.handle(message);
            }
        }
    }

    fn handle(&self, message: InboundMessage) {
        match &message {
            InboundMessage::Analog { pin, value } => {
                if self.shared.sensors.record(&self.pins, *pin, *value).is_none() {
                    return;
                }
                log::debug!("Pin: {pin} | Value: {value}");
            }
            InboundMessage::Digital { port, value } => {
                if *value > MAX_PORT_VALUE {
                    return;
                }
                log::debug!("Received Digital Message: port: {port}, value: {value:#010b}");
                self.shared.ports.store_port(*port, *value as u8);
            }
            InboundMessage::FirmwareVersion { major, minor, name } => {
                log::debug!("Received firmware {name} {major}.{minor}");
            }
            InboundMessage::ProtocolVersion { major, minor } => {
                log::debug!("Received protocol version {major}.{minor}");
            }
            InboundMessage::StringData(text) => log::debug!("Board says: {text}"),
            InboundMessage::Sysex { command, .. } => {
                log::debug!("SysEx message received: {command:#04x}")
            }
            InboundMessage::Unknown(_) => return,
        }

        // Nobody listening is fine
        let _ = self.events.send(message);
    }
}

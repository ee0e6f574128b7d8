use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_stream::StreamExt;

use asuro_firmata::asuro::{Direction, LedColor, SensorChannel};
use asuro_firmata::devices::{self, SerialSession};
use asuro_firmata::protocol::InboundMessage;
use asuro_firmata::SessionConfig;

/// Drive an Asuro robot running Firmata over a serial link
#[derive(Parser, Debug)]
#[command(name = "asuro", version, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overrides the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List serial ports the robot could be on
    Ports,
    /// Print sensor readings as they arrive
    Monitor {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Set the status LED
    Led {
        #[arg(value_enum)]
        color: Color,
    },
    /// Switch the front LED
    FrontLed {
        #[arg(action = clap::ArgAction::Set)]
        on: bool,
    },
    /// Run both motors for a while. Negative speeds drive backward.
    Move {
        #[arg(allow_hyphen_values = true)]
        left: i32,
        #[arg(allow_hyphen_values = true)]
        right: i32,
        /// How long to drive, in milliseconds
        #[arg(long, default_value_t = 1000)]
        millis: u64,
    },
    /// Drive each wheel a number of encoder steps. Negative steps go backward.
    Steps {
        #[arg(allow_hyphen_values = true)]
        left: i32,
        #[arg(allow_hyphen_values = true)]
        right: i32,
        #[arg(long, default_value_t = 50)]
        speed: i32,
    },
    /// Pivot in place. Positive angles turn clockwise.
    Turn {
        #[arg(allow_hyphen_values = true)]
        degrees: i32,
    },
    /// Drive forward with a motor calibration applied
    Calibrate {
        #[arg(allow_hyphen_values = true)]
        bias: f64,
        #[arg(default_value_t = 1.0)]
        scale: f64,
        #[arg(long, default_value_t = 50)]
        speed: i32,
        #[arg(long, default_value_t = 2000)]
        millis: u64,
    },
    /// Set the wheel encoder trigger levels
    Odometry {
        left: i32,
        right: i32,
        #[arg(default_value_t = 0)]
        hysteresis: i32,
    },
    /// Switch encoder debug output of the firmware
    OdometryDebug {
        #[arg(action = clap::ArgAction::Set)]
        on: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Color {
    Off,
    Green,
    Red,
    Orange,
}

impl From<Color> for LedColor {
    fn from(color: Color) -> Self {
        match color {
            Color::Off => LedColor::Off,
            Color::Green => LedColor::Green,
            Color::Red => LedColor::Red,
            Color::Orange => LedColor::Orange,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Cmd::Ports = args.command {
        for port in devices::find_serial_ports()? {
            println!("{} ({:?})", port.port_info.port_name, port.port_type);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if args.port.is_some() {
        config.serial.port = args.port.clone();
    }

    let mut session = SerialSession::open(config)?;
    session.initialise().await?;

    let result = run(&mut session, args.command).await;
    session.disconnect().await?;
    result
}

async fn run(session: &mut SerialSession, command: Cmd) -> anyhow::Result<()> {
    match command {
        Cmd::Ports => {}
        Cmd::Monitor { seconds } => {
            let mut events = session.events();
            session.report_firmware_version().await?;

            let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
            loop {
                let next = match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, events.next()).await {
                        Ok(next) => next,
                        Err(_) => break,
                    },
                    None => events.next().await,
                };

                match next {
                    Some(Ok(InboundMessage::Analog { .. })) => {
                        let values: Vec<String> = SensorChannel::ALL
                            .iter()
                            .map(|c| session.get_sensor_value(*c).map(|v| format!("{c:?}={v}")))
                            .collect::<Result<_, _>>()?;
                        println!("{}", values.join(" "));
                    }
                    Some(Ok(InboundMessage::FirmwareVersion { major, minor, name })) => {
                        println!("Firmware {name} {major}.{minor}");
                    }
                    Some(Ok(other)) => log::debug!("{other:?}"),
                    Some(Err(e)) => log::warn!("Monitor fell behind: {e}"),
                    None => break,
                }
            }
        }
        Cmd::Led { color } => session.set_status_led(color.into()).await?,
        Cmd::FrontLed { on } => session.set_front_led(on).await?,
        Cmd::Move { left, right, millis } => {
            drive(session, left, right).await?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            session.stop_all_movements().await?;
        }
        Cmd::Steps { left, right, speed } => session.move_steps(left, right, speed).await?,
        Cmd::Turn { degrees } => session.turn_angle(degrees).await?,
        Cmd::Calibrate { bias, scale, speed, millis } => {
            session.set_motor_calibration(bias, scale).await?;
            session.move_forward(speed).await?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            session.stop_all_movements().await?;
        }
        Cmd::Odometry { left, right, hysteresis } => {
            session.configure_odometry(left, right, hysteresis).await?
        }
        Cmd::OdometryDebug { on } => session.set_odometry_debug(on).await?,
    }

    Ok(())
}

async fn drive(session: &mut SerialSession, left: i32, right: i32) -> anyhow::Result<()> {
    match Direction::from_sign(left as i64) {
        Direction::Forward => session.move_left_motor_forward(left).await?,
        Direction::Backward => session.move_left_motor_backward(left.saturating_neg()).await?,
    }
    match Direction::from_sign(right as i64) {
        Direction::Forward => session.move_right_motor_forward(right).await?,
        Direction::Backward => session.move_right_motor_backward(right.saturating_neg()).await?,
    }
    Ok(())
}

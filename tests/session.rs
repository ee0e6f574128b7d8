use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_stream::StreamExt;

use asuro_firmata::asuro::{
    LedColor, MotorCalibration, PinAssignment, ProtocolVersion, SensorChannel,
};
use asuro_firmata::devices::AsuroSession;
use asuro_firmata::errors::{ConfigError, SessionError};
use asuro_firmata::protocol::InboundMessage;
use asuro_firmata::{SessionConfig, SessionState};

type TestSession = AsuroSession<tokio::io::ReadHalf<DuplexStream>, tokio::io::WriteHalf<DuplexStream>>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn session(version: ProtocolVersion) -> (TestSession, DuplexStream) {
    init_logger();
    let (client, board) = tokio::io::duplex(4096);
    let session = AsuroSession::from_stream(SessionConfig::for_version(version), client).unwrap();
    (session, board)
}

async fn initialised(version: ProtocolVersion) -> (TestSession, DuplexStream) {
    let (mut session, mut board) = session(version);
    session.initialise().await.unwrap();
    drain(&mut board).await;
    (session, board)
}

/// Reads everything the session wrote so far
async fn drain(board: &mut DuplexStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        match tokio::time::timeout(Duration::from_millis(20), board.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => out.extend_from_slice(&buf[..n]),
            _ => break,
        }
    }
    out
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn commands_need_initialise() {
    let (mut session, mut board) = session(ProtocolVersion::V2);

    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(session.move_forward(50).await, Err(SessionError::NotInitialized));
    assert_eq!(session.pause().await, Err(SessionError::NotInitialized));

    assert!(!session.is_alive().await);
    assert_eq!(
        session.get_sensor_value(SensorChannel::Bumpers),
        Err(SessionError::NotInitialized)
    );
    assert_eq!(session.get_bumper_status(0), Err(SessionError::NotInitialized));
    assert_eq!(session.bumper_distance(), Err(SessionError::NotInitialized));
    assert_eq!(session.digital_pin(4), Err(SessionError::NotInitialized));
    assert!(drain(&mut board).await.is_empty());
}

#[tokio::test]
async fn getters_fail_after_destroy() {
    let (mut session, _board) = initialised(ProtocolVersion::V2).await;
    session.destroy().await.unwrap();

    assert!(!session.is_alive().await);
    assert_eq!(
        session.get_sensor_value(SensorChannel::SideLeft),
        Err(SessionError::AlreadyDestroyed)
    );
    assert_eq!(session.get_bumper_status(0), Err(SessionError::AlreadyDestroyed));
    assert_eq!(session.bumper_distance(), Err(SessionError::AlreadyDestroyed));
    assert_eq!(session.digital_pin(4), Err(SessionError::AlreadyDestroyed));
}

#[tokio::test]
async fn fresh_session_has_no_bumper_pressed() {
    let (session, _board) = initialised(ProtocolVersion::V2).await;

    for index in 0..6 {
        assert_eq!(session.get_bumper_status(index), Ok(false));
    }
}

#[tokio::test]
async fn invalid_pin_table_is_rejected_up_front() {
    init_logger();
    let (client, _board) = tokio::io::duplex(64);
    let mut pins = PinAssignment::v2();
    pins.front_led = 20;
    let config = SessionConfig {
        pins: Some(pins),
        ..SessionConfig::default()
    };

    assert!(matches!(
        AsuroSession::from_stream(config, client),
        Err(ConfigError::Invalid(_))
    ));
}

#[tokio::test]
async fn initialise_configures_the_board() {
    let (mut session, mut board) = session(ProtocolVersion::V2);
    session.initialise().await.unwrap();
    let written = drain(&mut board).await;

    assert_eq!(session.state(), SessionState::Active);
    // PWM on the speed pins
    assert!(contains(&written, &[0xF4, 9, 0x03]));
    // Bumper ladder reporting
    assert!(contains(&written, &[0xC4, 1]));
    // Bumper enable line on pin 3, port 0
    assert!(contains(&written, &[0xF4, 3, 0x01, 0x90, 0x08, 0x00]));
    assert!(contains(&written, &[0xD0, 1]));
    assert!(contains(&written, &[0xD1, 1]));

    // Again is a no-op
    session.initialise().await.unwrap();
    assert!(drain(&mut board).await.is_empty());
}

#[tokio::test]
async fn motor_frames_v1() {
    let (mut session, mut board) = initialised(ProtocolVersion::V1).await;

    session.move_left_motor_forward(50).await.unwrap();
    assert_eq!(
        drain(&mut board).await,
        vec![
            0xE9, 0x7F, 0x00, // speed 127 on pin 9
            0xF4, 5, 0x01, 0x90, 0x20, 0x00, // forward pin 5 high
            0xF4, 4, 0x01, 0x90, 0x20, 0x00, // backward pin 4 low, port re-sent
        ]
    );
}

#[tokio::test]
async fn calibration_slows_one_motor() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    session.set_motor_calibration(0.5, 1.0).await.unwrap();
    session.move_forward(80).await.unwrap();
    let written = drain(&mut board).await;

    assert!(contains(&written, &[0xE9, 80, 0]));
    assert!(contains(&written, &[0xEA, 40, 0]));
}

#[tokio::test]
async fn digital_pins_share_their_port() {
    let (mut session, mut board) = initialised(ProtocolVersion::V1).await;

    session.set_digital_pin(13, true).await.unwrap();
    session.set_digital_pin(9, true).await.unwrap();
    let written = drain(&mut board).await;

    assert!(written.ends_with(&[0xF4, 9, 0x01, 0x91, 0x22, 0x00]));
    assert_eq!(session.digital_pin(9), Ok(true));
    assert_eq!(session.digital_pin(12), Ok(false));
    assert_eq!(session.set_digital_pin(20, true).await, Err(SessionError::InvalidPin(20)));
}

#[tokio::test]
async fn same_pin_twice_sends_two_frames() {
    let (mut session, mut board) = initialised(ProtocolVersion::V1).await;

    session.set_digital_pin(4, true).await.unwrap();
    session.set_digital_pin(4, true).await.unwrap();

    assert_eq!(
        drain(&mut board).await,
        vec![
            0xF4, 4, 0x01, 0x90, 0x10, 0x00, //
            0xF4, 4, 0x01, 0x90, 0x10, 0x00,
        ]
    );
    assert_eq!(session.shared_state().ports.port(0).bits(), 0x10);
}

#[tokio::test]
async fn turns_use_the_calibration_table() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    session.turn_angle(90).await.unwrap();
    assert_eq!(
        drain(&mut board).await,
        vec![0xF0, 0x44, 26, 0, 26, 0, 0x01, 0x7F, 40, 0xF7]
    );

    session.turn_angle(-180).await.unwrap();
    assert_eq!(
        drain(&mut board).await,
        vec![0xF0, 0x44, 53, 0, 53, 0, 0x7F, 0x01, 40, 0xF7]
    );
}

#[tokio::test]
async fn signed_steps_pick_the_direction() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    session.move_steps(-200, 300, 150).await.unwrap();
    assert_eq!(
        drain(&mut board).await,
        vec![0xF0, 0x44, 0x48, 0x01, 0x2C, 0x02, 0x7F, 0x01, 100, 0xF7]
    );
}

#[tokio::test]
async fn odometry_commands() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    session.configure_odometry(20000, 5, 3).await.unwrap();
    assert_eq!(
        drain(&mut board).await,
        vec![0xF0, 0x45, 0x7F, 0x7F, 5, 0, 3, 0, 0xF7]
    );

    session.set_odometry_debug(true).await.unwrap();
    assert_eq!(drain(&mut board).await, vec![0xF0, 0x46, 1, 0xF7]);
}

#[tokio::test]
async fn status_led_v2_is_digital() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    session.set_status_led(LedColor::Orange).await.unwrap();
    let written = drain(&mut board).await;

    // Red on pin 2, green on pin 8
    assert!(contains(&written, &[0xF4, 2, 0x01]));
    assert!(contains(&written, &[0xF4, 8, 0x01, 0x91, 0x01, 0x00]));
    assert_eq!(session.digital_pin(2), Ok(true));
    assert_eq!(session.digital_pin(8), Ok(true));
}

#[tokio::test]
async fn pause_and_resume() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;
    session.set_motor_calibration(0.5, 0.8).await.unwrap();
    session.set_front_led(true).await.unwrap();
    session.set_status_led(LedColor::Red).await.unwrap();
    drain(&mut board).await;

    session.pause().await.unwrap();
    let written = drain(&mut board).await;
    assert_eq!(session.state(), SessionState::Paused);
    assert!(contains(&written, &[0xE9, 0, 0]));
    assert!(contains(&written, &[0xC4, 0]));
    // Front LED off; forward pin 5 and enable lines 3 and 7 stay high
    assert!(contains(&written, &[0xF4, 6, 0x01, 0x90, 0x28, 0x01]));
    assert_eq!(session.digital_pin(2), Ok(false));
    assert_eq!(session.digital_pin(6), Ok(false));
    assert_eq!(session.calibration(), MotorCalibration::NEUTRAL);

    // Any command resumes the session
    session.set_front_led(true).await.unwrap();
    let written = drain(&mut board).await;
    assert_eq!(session.state(), SessionState::Active);
    assert!(contains(&written, &[0xC4, 1]));
}

#[tokio::test]
async fn pause_keeps_reporting_when_configured() {
    init_logger();
    let (client, mut board) = tokio::io::duplex(4096);
    let config = SessionConfig {
        stop_sensor_reporting_on_pause: false,
        ..SessionConfig::default()
    };
    let mut session = AsuroSession::from_stream(config, client).unwrap();
    session.initialise().await.unwrap();
    drain(&mut board).await;

    session.pause().await.unwrap();
    assert!(!contains(&drain(&mut board).await, &[0xC4, 0]));
}

#[tokio::test]
async fn sensor_reports_reach_state_and_events() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;
    let mut events = session.events();

    // Bumpers at 1000
    board.write_all(&[0xE4, 0x68, 0x07]).await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event, InboundMessage::Analog { pin: 4, value: 1000 });

    assert_eq!(session.get_sensor_value(SensorChannel::Bumpers), Ok(1000));
    assert!((session.bumper_distance().unwrap() - 3.772).abs() < 1e-6);
    // 3 is 0b11
    assert_eq!(session.get_bumper_status(0), Ok(true));
    assert_eq!(session.get_bumper_status(1), Ok(true));
    assert_eq!(session.get_bumper_status(2), Ok(false));
    assert_eq!(session.get_bumper_status(6), Err(SessionError::InvalidBumper(6)));

    session.destroy().await.unwrap();
}

#[tokio::test]
async fn firmware_report_and_liveness() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    assert!(session.is_alive().await);
    assert_eq!(drain(&mut board).await, vec![0xF0, 0x79, 0xF7]);

    session.report_firmware_version().await.unwrap();
    assert_eq!(drain(&mut board).await, vec![0xF0, 0x79, 0xF7]);

    session.destroy().await.unwrap();
    assert!(!session.is_alive().await);
}

#[tokio::test]
async fn disconnect_leaves_the_robot_quiet() {
    let (mut session, mut board) = initialised(ProtocolVersion::V2).await;

    session.disconnect().await.unwrap();
    let written = drain(&mut board).await;

    assert_eq!(session.state(), SessionState::Destroyed);
    // Enable lines dropped
    assert!(contains(&written, &[0xF4, 3, 0x01]));
    assert!(contains(&written, &[0xF4, 7, 0x01]));
    let shared = session.shared_state();
    assert_eq!(shared.ports.pin(3), Ok(false));
    assert_eq!(shared.ports.pin(7), Ok(false));
    // Reporting off
    assert!(contains(&written, &[0xC0, 0]));

    assert_eq!(session.disconnect().await, Err(SessionError::AlreadyDestroyed));
    assert_eq!(session.move_forward(10).await, Err(SessionError::AlreadyDestroyed));
    assert_eq!(session.initialise().await, Err(SessionError::AlreadyDestroyed));
}

#[tokio::test]
async fn destroy_before_initialise() {
    let (mut session, _board) = session(ProtocolVersion::V1);

    session.destroy().await.unwrap();
    assert_eq!(session.state(), SessionState::Destroyed);
    assert_eq!(session.destroy().await, Err(SessionError::AlreadyDestroyed));
}

#[tokio::test]
async fn writes_after_the_board_hangs_up_are_swallowed() {
    let (mut session, board) = initialised(ProtocolVersion::V2).await;
    drop(board);

    session.move_forward(50).await.unwrap();
    assert!(!session.is_alive().await);
    assert_eq!(session.state(), SessionState::Active);
}

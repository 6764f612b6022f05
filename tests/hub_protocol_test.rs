//! End-to-end tests of the hub, monitoring thread and parser against the
//! in-memory mock transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use squid_ctrl::protocol::{Command, COMMAND_FRAME_LEN, MESSAGE_LEN};
use squid_ctrl::{
    Axis, CommandFrame, JoystickEvent, MockTransport, Settings, SquidError, SquidHub,
};

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.poll_interval_us = 200;
    settings.ack_timeout_ms = 1000;
    settings.settle_timeout_ms = 1000;
    settings
}

fn hub_over_mock() -> (Arc<SquidHub>, MockTransport) {
    let mock = MockTransport::new();
    let hub = SquidHub::with_transport(Box::new(mock.clone()), &test_settings())
        .expect("hub construction");
    (hub, mock)
}

fn status_frame(seq: u8, x: i32, y: i32, z: i32, busy: u8, joystick: u8) -> [u8; MESSAGE_LEN] {
    let mut raw = [0u8; MESSAGE_LEN];
    raw[0] = seq;
    raw[2..6].copy_from_slice(&x.to_be_bytes());
    raw[6..10].copy_from_slice(&y.to_be_bytes());
    raw[10..14].copy_from_slice(&z.to_be_bytes());
    raw[14] = busy;
    raw[15] = joystick;
    raw
}

/// Poll until `cond` holds or a second has passed.
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn sequence_numbers_are_distinct_and_monotonic() {
    let (hub, mock) = hub_over_mock();

    let mut prev: Option<u8> = None;
    for _ in 0..5 {
        let seq = hub.send_command(CommandFrame::turn_on_illumination()).unwrap();
        if let Some(p) = prev {
            assert_eq!(seq, p.wrapping_add(1));
        }
        prev = Some(seq);

        mock.push_incoming(&status_frame(seq, 0, 0, 0, 0, 0));
        hub.wait_for_ack(seq, Duration::from_secs(1)).unwrap();
        assert!(!hub.is_command_pending(seq));
    }

    hub.shutdown().unwrap();
}

#[test]
fn pending_is_true_until_matching_ack() {
    let (hub, mock) = hub_over_mock();

    let seq = hub.send_command(CommandFrame::turn_off_illumination()).unwrap();
    assert!(hub.is_command_pending(seq));

    // an echo of a different sequence number must not clear the slot
    mock.push_incoming(&status_frame(seq.wrapping_sub(1), 0, 0, 0, 0, 0));
    std::thread::sleep(Duration::from_millis(20));
    assert!(hub.is_command_pending(seq));

    mock.push_incoming(&status_frame(seq, 0, 0, 0, 0, 0));
    assert!(wait_until(|| !hub.is_command_pending(seq)));

    hub.shutdown().unwrap();
}

#[test]
fn move_command_applies_axis_sign_on_the_wire() {
    let (hub, mock) = hub_over_mock();

    // logical +1000 steps on X, movement sign -1
    let seq = hub.send_move(Axis::X, 1000).unwrap();
    let written = mock.take_written();
    assert_eq!(written.len(), COMMAND_FRAME_LEN);
    assert_eq!(written[0], seq);
    assert_eq!(written[1], Command::MoveX.code());
    let steps = i32::from_be_bytes(written[2..6].try_into().unwrap());
    assert_eq!(steps, -1000);

    // the ack frame carries the new device position; readback is
    // sign-corrected back into logical steps
    mock.push_incoming(&status_frame(seq, -1000, 0, 0, 0, 0));
    hub.wait_for_ack(seq, Duration::from_secs(1)).unwrap();
    assert!(wait_until(|| hub.position_steps(Axis::X).unwrap() == 1000));

    hub.shutdown().unwrap();
}

#[test]
fn ack_timeout_is_reported_not_swallowed() {
    let (hub, _mock) = hub_over_mock();

    let seq = hub.send_command(CommandFrame::turn_on_illumination()).unwrap();
    let err = hub.wait_for_ack(seq, Duration::from_millis(50)).unwrap_err();
    match err {
        SquidError::AckTimeout { sequence, .. } => assert_eq!(sequence, seq),
        other => panic!("expected AckTimeout, got {other}"),
    }
    // still pending; caller decides what to do next
    assert!(hub.is_command_pending(seq));

    hub.received_command(seq);
    assert!(!hub.is_command_pending(seq));

    hub.shutdown().unwrap();
}

#[test]
fn partial_frame_produces_no_state_change() {
    let (hub, mock) = hub_over_mock();

    let frame = status_frame(0, 777, 0, 0, 0b001, 0);
    mock.push_incoming(&frame[..MESSAGE_LEN - 1]);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(hub.position_steps(Axis::X).unwrap(), 0);
    assert!(!hub.is_busy(Axis::X));

    // completing the frame releases it
    mock.push_incoming(&frame[MESSAGE_LEN - 1..]);
    assert!(wait_until(|| hub.position_steps(Axis::X).unwrap() == -777));
    assert!(hub.is_busy(Axis::X));
    assert!(hub.is_busy(Axis::Xy));
    assert!(!hub.is_busy(Axis::Z));

    hub.shutdown().unwrap();
}

#[test]
fn busy_flags_follow_the_status_stream() {
    let (hub, mock) = hub_over_mock();

    mock.push_incoming(&status_frame(0, 0, 0, 0, 0b111, 0));
    assert!(wait_until(|| hub.is_busy(Axis::Z)));
    assert!(hub.is_busy(Axis::X));
    assert!(hub.is_busy(Axis::Y));

    mock.push_incoming(&status_frame(0, 0, 0, 0, 0, 0));
    assert!(wait_until(|| !hub.is_busy(Axis::Z)));
    assert!(!hub.is_busy(Axis::Xy));

    hub.shutdown().unwrap();
}

#[test]
fn concurrent_senders_never_interleave_frames() {
    let (hub, mock) = hub_over_mock();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let hub = hub.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..10 {
                hub.send_command(CommandFrame::turn_on_illumination()).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let written = mock.take_written();
    assert_eq!(written.len(), 40 * COMMAND_FRAME_LEN);

    // every frame intact: correct command code in byte 1, and all 40
    // sequence numbers distinct (interleaved frames would corrupt both)
    let mut seen = std::collections::HashSet::new();
    for frame in written.chunks(COMMAND_FRAME_LEN) {
        assert_eq!(frame[1], Command::TurnOnIllumination.code());
        assert!(seen.insert(frame[0]));
    }
    assert_eq!(seen.len(), 40);

    hub.shutdown().unwrap();
}

#[test]
fn joystick_button_press_is_forwarded_once() {
    let (hub, mock) = hub_over_mock();

    let (tx, rx) = std::sync::mpsc::channel();
    hub.set_joystick_listener(tx);

    // held for several frames: one event, on the rising edge
    mock.push_incoming(&status_frame(0, 0, 0, 0, 0, 0x01));
    mock.push_incoming(&status_frame(0, 0, 0, 0, 0, 0x01));
    mock.push_incoming(&status_frame(0, 0, 0, 0, 0, 0x01));

    let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(event, JoystickEvent::ButtonPressed);
    std::thread::sleep(Duration::from_millis(20));
    assert!(rx.try_recv().is_err());

    // driver acknowledges the press back to the firmware
    let seq = hub.ack_joystick_button().unwrap();
    let written = mock.take_written();
    assert_eq!(written[0], seq);
    assert_eq!(written[1], Command::AckJoystickButtonPressed.code());

    hub.shutdown().unwrap();
}

#[test]
fn shutdown_is_idempotent() {
    let (hub, _mock) = hub_over_mock();
    hub.shutdown().unwrap();
    hub.shutdown().unwrap();
}

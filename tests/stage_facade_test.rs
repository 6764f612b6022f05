//! Façade tests: micrometer conversion and illumination state driven
//! through the hub against a scripted mock "firmware".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

use squid_ctrl::protocol::{Command, COMMAND_FRAME_LEN, MESSAGE_LEN};
use squid_ctrl::{LedShutter, MockTransport, Settings, SquidHub, XyStage, ZStage};

struct Firmware {
    stop: Arc<AtomicBool>,
    frames: Receiver<Vec<u8>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

/// Background responder: acknowledges every command frame the host writes
/// and hands the frame to the test for inspection.
fn spawn_firmware(mock: MockTransport) -> Firmware {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let (tx, rx) = channel();

    let thread = std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            let written = mock.take_written();
            for frame in written.chunks(COMMAND_FRAME_LEN) {
                let mut ack = [0u8; MESSAGE_LEN];
                ack[0] = frame[0];
                mock.push_incoming(&ack);
                let _ = tx.send(frame.to_vec());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    Firmware {
        stop,
        frames: rx,
        thread: Some(thread),
    }
}

impl Drop for Firmware {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Firmware {
    fn next_frame(&self) -> Vec<u8> {
        self.frames
            .recv_timeout(Duration::from_secs(1))
            .expect("firmware saw no frame")
    }
}

fn setup() -> (Arc<SquidHub>, Firmware, Settings) {
    let mut settings = Settings::default();
    settings.poll_interval_us = 200;
    settings.settle_timeout_ms = 1000;
    let mock = MockTransport::new();
    let hub = SquidHub::with_transport(Box::new(mock.clone()), &settings).expect("hub");
    let firmware = spawn_firmware(mock);
    (hub, firmware, settings)
}

#[test]
fn z_stage_converts_micrometers_to_steps() {
    let (hub, firmware, settings) = setup();
    let z = ZStage::new(hub.clone(), &settings);

    // stock Z calibration: 0.005859375 um per microstep
    z.move_relative_um(5.0).unwrap();

    let frame = firmware.next_frame();
    assert_eq!(frame[1], Command::MoveZ.code());
    let steps = i32::from_be_bytes(frame[2..6].try_into().unwrap());
    // round(5.0 / 0.005859375) = 853, negated by the Z movement sign
    assert_eq!(steps, -853);

    hub.shutdown().unwrap();
}

#[test]
fn z_stage_skips_zero_length_moves() {
    let (hub, firmware, settings) = setup();
    let z = ZStage::new(hub.clone(), &settings);

    z.move_relative_um(0.0).unwrap();
    assert!(firmware
        .frames
        .recv_timeout(Duration::from_millis(50))
        .is_err());

    hub.shutdown().unwrap();
}

#[test]
fn xy_stage_absolute_move_targets_both_axes() {
    let (hub, firmware, settings) = setup();
    let xy = XyStage::new(hub.clone(), &settings);

    xy.move_absolute_um(100.0, -50.0).unwrap();

    let first = firmware.next_frame();
    let second = firmware.next_frame();
    assert_eq!(first[1], Command::MoveToX.code());
    assert_eq!(second[1], Command::MoveToY.code());

    let step_um = settings.stage_x.step_size_um();
    let x_steps = i32::from_be_bytes(first[2..6].try_into().unwrap());
    let y_steps = i32::from_be_bytes(second[2..6].try_into().unwrap());
    assert_eq!(x_steps, -((100.0 / step_um).round() as i32));
    assert_eq!(y_steps, (50.0 / step_um).round() as i32);

    hub.shutdown().unwrap();
}

#[test]
fn xy_home_sends_aggregate_axis_and_settles() {
    let (hub, firmware, settings) = setup();
    let xy = XyStage::new(hub.clone(), &settings);

    // acked immediately and never reported busy, so home returns once the
    // grace window has passed
    xy.home().unwrap();

    let frame = firmware.next_frame();
    assert_eq!(frame[1], Command::HomeOrZero.code());
    assert_eq!(frame[2], 4); // aggregate XY axis code

    hub.shutdown().unwrap();
}

#[test]
fn stop_in_place_is_unsupported() {
    let (hub, _firmware, settings) = setup();
    let xy = XyStage::new(hub.clone(), &settings);
    let z = ZStage::new(hub.clone(), &settings);

    assert!(xy.stop().is_err());
    assert!(z.stop().is_err());
    assert!(z.set_origin().is_err());

    hub.shutdown().unwrap();
}

#[test]
fn shutter_open_sends_pattern_then_on() {
    let (hub, firmware, settings) = setup();
    let _ = settings;
    let mut shutter = LedShutter::new(hub.clone());

    shutter.set_open(true).unwrap();
    assert!(shutter.is_open());

    let matrix = firmware.next_frame();
    assert_eq!(matrix[1], Command::SetIlluminationLedMatrix.code());
    // default: full array, white at 50% -> 128 per channel
    assert_eq!(matrix[2], 0);
    assert_eq!(&matrix[3..6], &[128, 128, 128]);

    let on = firmware.next_frame();
    assert_eq!(on[1], Command::TurnOnIllumination.code());

    shutter.set_open(false).unwrap();
    let off = firmware.next_frame();
    assert_eq!(off[1], Command::TurnOffIllumination.code());
    assert!(!shutter.is_open());

    hub.shutdown().unwrap();
}

#[test]
fn shutter_intensity_change_repushes_while_open() {
    let (hub, firmware, _settings) = setup();
    let mut shutter = LedShutter::new(hub.clone());

    // closed: state change stays local
    shutter.set_intensity(100.0).unwrap();
    assert!(firmware
        .frames
        .recv_timeout(Duration::from_millis(50))
        .is_err());

    shutter.set_open(true).unwrap();
    let _matrix = firmware.next_frame();
    let _on = firmware.next_frame();

    shutter.set_intensity(25.0).unwrap();
    let matrix = firmware.next_frame();
    assert_eq!(matrix[1], Command::SetIlluminationLedMatrix.code());
    assert_eq!(&matrix[3..6], &[64, 64, 64]);

    hub.shutdown().unwrap();
}

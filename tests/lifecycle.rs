//! End-to-end camera session lifecycle tests against the mock platform.

use proptest::prelude::*;
use shelfscan::capture::{CameraDevice, MockCameraPlatform, StreamLedger};
use shelfscan::scanner::{
    CameraSessionManager, DecodeScript, MockDecoderFactory, ScanError, ScanEvent,
    ScriptedDecoderFactory, SessionConfig, SessionState,
};
use std::time::Duration;

fn shop_cameras() -> Vec<CameraDevice> {
    vec![
        CameraDevice::new("cam-front", "Front Camera"),
        CameraDevice::new("cam-back", "Back Camera"),
        CameraDevice::new("cam-usb", "USB Video Device"),
    ]
}

fn manager() -> (
    CameraSessionManager<MockCameraPlatform, MockDecoderFactory>,
    StreamLedger,
) {
    let platform = MockCameraPlatform::with_devices(shop_cameras()).hide_labels_until_granted();
    let ledger = platform.ledger();
    let scanner = CameraSessionManager::new(
        platform,
        MockDecoderFactory::new(),
        SessionConfig::immediate(),
    );
    (scanner, ledger)
}

fn assert_all_released(ledger: &StreamLedger) {
    assert_eq!(ledger.live_tracks(), 0);
    for record in ledger.records() {
        assert_eq!(record.live_tracks(), 0, "stream {} leaked", record.stream_id);
    }
}

#[test]
fn test_selects_back_camera_after_permission_probe() {
    let (mut scanner, ledger) = manager();

    scanner.start_scanning().unwrap();

    assert_eq!(scanner.active_device().unwrap().id, "cam-back");
    // Probe stream released before the real one was opened
    let records = ledger.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].probe);
    assert_eq!(records[0].live_tracks(), 0);
    assert_eq!(records[1].device_id, "cam-back");
    assert_eq!(ledger.live_streams(), 1);

    scanner.stop_scanning();
    assert_all_released(&ledger);
}

#[test]
fn test_falls_back_to_first_camera() {
    let platform = MockCameraPlatform::with_devices(vec![
        CameraDevice::new("a", "Integrated Webcam"),
        CameraDevice::new("b", "USB Video Device"),
    ]);
    let mut scanner =
        CameraSessionManager::new(platform, MockDecoderFactory::new(), SessionConfig::immediate());

    scanner.start_scanning().unwrap();
    assert_eq!(scanner.active_device().unwrap().id, "a");
}

#[test]
fn test_no_camera_leaves_manager_idle() {
    let platform = MockCameraPlatform::new();
    let ledger = platform.ledger();
    let mut scanner =
        CameraSessionManager::new(platform, MockDecoderFactory::new(), SessionConfig::immediate());
    let events = scanner.subscribe();

    assert_eq!(scanner.start_scanning(), Err(ScanError::NoCameraAvailable));
    assert_eq!(scanner.state(), SessionState::Idle);
    assert!(ledger.records().is_empty());
    assert!(events
        .try_iter()
        .any(|e| e == ScanEvent::Failed(ScanError::NoCameraAvailable)));
}

#[test]
fn test_permission_denied_is_reported() {
    let platform = MockCameraPlatform::with_devices(shop_cameras()).deny_permission();
    let mut scanner =
        CameraSessionManager::new(platform, MockDecoderFactory::new(), SessionConfig::immediate());

    assert_eq!(scanner.start_scanning(), Err(ScanError::PermissionDenied));
    assert_eq!(scanner.state(), SessionState::Idle);
}

#[test]
fn test_second_start_never_opens_second_stream() {
    let (mut scanner, ledger) = manager();

    scanner.start_scanning().unwrap();
    assert_eq!(scanner.start_scanning(), Err(ScanError::AlreadyScanning));
    assert_eq!(scanner.start_scanning(), Err(ScanError::AlreadyScanning));

    assert_eq!(ledger.live_streams(), 1);
    assert_eq!(ledger.acquisitions().len(), 1);
    assert_eq!(scanner.state(), SessionState::Active);
}

#[test]
fn test_decode_fires_once_and_allows_restart() {
    let (mut scanner, ledger) = manager();
    let events = scanner.subscribe();

    let first = scanner.start_scanning().unwrap();
    let handle = scanner.decoders().last().unwrap();
    handle.detect("4006381333931");
    handle.detect("4006381333931");
    scanner.pump();

    let decoded: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            ScanEvent::Decoded(result) => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].code, "4006381333931");
    assert_eq!(decoded[0].session_id, first);

    // Released by the time the result is observable
    assert_all_released(&ledger);
    assert!(!handle.is_running());
    assert_eq!(scanner.stats().discarded_events, 1);

    let second = scanner.start_scanning().unwrap();
    assert!(second > first);
    assert_eq!(scanner.state(), SessionState::Active);
}

#[test]
fn test_dispose_with_pending_decode() {
    let (mut scanner, ledger) = manager();
    let events = scanner.subscribe();

    scanner.start_scanning().unwrap();
    scanner.decoders().last().unwrap().detect("9780201379624");
    scanner.dispose();

    assert_all_released(&ledger);
    assert_eq!(scanner.state(), SessionState::Idle);
    assert!(!events
        .try_iter()
        .any(|e| matches!(e, ScanEvent::Decoded(_))));

    // Nothing left to deliver after dispose
    assert_eq!(scanner.pump(), 0);
}

#[test]
fn test_drop_while_worker_is_decoding() {
    let platform = MockCameraPlatform::with_devices(shop_cameras());
    let ledger = platform.ledger();
    let decoders = ScriptedDecoderFactory::new(DecodeScript {
        code: Some("5012345678900".into()),
        misses: 0,
        frame_interval: Some(Duration::from_millis(1)),
    });

    {
        let mut scanner = CameraSessionManager::new(platform, decoders, SessionConfig::immediate());
        scanner.start_scanning().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        // Dropped with detections queued and the worker still running
    }

    assert_all_released(&ledger);
}

#[test]
fn test_scripted_decoder_end_to_end() {
    let platform = MockCameraPlatform::with_devices(shop_cameras()).with_focus_capability();
    let ledger = platform.ledger();
    let decoders = ScriptedDecoderFactory::new(DecodeScript {
        code: Some("8712345678906".into()),
        misses: 2,
        frame_interval: Some(Duration::from_millis(5)),
    });
    let mut scanner = CameraSessionManager::new(platform, decoders, SessionConfig::immediate());
    let events = scanner.subscribe();

    scanner.start_scanning().unwrap();
    assert!(scanner.nudge_focus());

    let mut decoded = None;
    for _ in 0..200 {
        scanner.pump_timeout(Duration::from_millis(10));
        if let Some(result) = events.try_iter().find_map(|e| match e {
            ScanEvent::Decoded(result) => Some(result),
            _ => None,
        }) {
            decoded = Some(result);
            break;
        }
    }

    assert_eq!(decoded.unwrap().code, "8712345678906");
    assert_eq!(scanner.state(), SessionState::Idle);
    assert_all_released(&ledger);
}

#[test]
fn test_runtime_error_releases_and_recovers() {
    let (mut scanner, ledger) = manager();
    let events = scanner.subscribe();

    scanner.start_scanning().unwrap();
    scanner.decoders().last().unwrap().fail("worker crashed");
    scanner.pump();

    assert_all_released(&ledger);
    assert!(events.try_iter().any(|e| matches!(
        e,
        ScanEvent::Failed(ScanError::DecoderRuntimeError(_))
    )));
    assert!(scanner.start_scanning().is_ok());
}

#[derive(Debug, Clone)]
enum Op {
    Start,
    Stop,
    Decode,
    Fail,
    Dispose,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Start),
        2 => Just(Op::Stop),
        2 => Just(Op::Decode),
        1 => Just(Op::Fail),
        1 => Just(Op::Dispose),
    ]
}

proptest! {
    #[test]
    fn prop_no_stream_outlives_its_session(ops in prop::collection::vec(op(), 0..40)) {
        let (mut scanner, ledger) = manager();

        for op in ops {
            match op {
                Op::Start => {
                    let _ = scanner.start_scanning();
                }
                Op::Stop => scanner.stop_scanning(),
                Op::Decode => {
                    if let Some(handle) = scanner.decoders().last() {
                        handle.detect("0012345678905");
                    }
                    scanner.pump();
                }
                Op::Fail => {
                    if let Some(handle) = scanner.decoders().last() {
                        handle.fail("lost frame source");
                    }
                    scanner.pump();
                }
                Op::Dispose => scanner.dispose(),
            }

            prop_assert!(ledger.live_streams() <= 1);
            let expected_live = usize::from(scanner.state() == SessionState::Active);
            prop_assert_eq!(ledger.live_streams(), expected_live);
        }

        scanner.dispose();

        prop_assert_eq!(scanner.stats().acquisitions, scanner.stats().teardowns);
        prop_assert_eq!(scanner.stats().acquisitions as usize, ledger.acquisitions().len());
        prop_assert_eq!(ledger.live_tracks(), 0);
    }
}

//! End-to-end runs of the stereo camera against the simulated board.
//!
//! Requires the `sim` feature (on by default).

#![cfg(feature = "sim")]

use chrono::Utc;
use stereocam_hw::sim::{pattern_value, HwWrite, SimBackend, SimProperty, PADDING_BYTE};
use stereocam_hw::{
    CameraConfig, CameraError, ColorFormat, Device, ErrorKind, ImageFormat, Port,
    PropertyAttribs, PropertyId, SensorSelect, Side, StereoCamera,
};

fn config() -> CameraConfig {
    CameraConfig {
        port_left: 1,
        port_right: 2,
        gain_left: 200,
        gain_right: 300,
        set_gain: true,
        exposure_left: 8.0,
        exposure_right: 9.5,
        set_exposure: true,
        timeout_ms: 500,
        frame_id: "stereo".to_string(),
        enable_logging: false,
    }
}

fn port(n: u32) -> Port {
    Port::new(n).unwrap()
}

#[test]
fn out_of_range_gain_is_replaced_by_default() {
    let mut cfg = config();
    cfg.gain_left = 5000;

    let camera = StereoCamera::open(SimBackend::stereo_rig(), &cfg).unwrap();
    let backend = camera.device().backend();

    assert_eq!(backend.int_setting(port(1), PropertyId::GainMonochrome), Some(500));
    assert_eq!(backend.int_setting(port(2), PropertyId::GainMonochrome), Some(300));
    assert!(backend
        .writes()
        .contains(&HwWrite::Int(SensorSelect::Sensor1, PropertyId::GainMonochrome, 500)));
    assert!(!backend
        .writes()
        .iter()
        .any(|w| matches!(w, HwWrite::Int(_, _, 5000))));
}

#[test]
fn out_of_range_exposure_is_replaced_by_default() {
    let mut cfg = config();
    cfg.exposure_right = 250.0;

    let camera = StereoCamera::open(SimBackend::stereo_rig(), &cfg).unwrap();
    let backend = camera.device().backend();

    assert_eq!(backend.float_setting(port(1), PropertyId::ExposureTime), Some(8.0));
    assert_eq!(backend.float_setting(port(2), PropertyId::ExposureTime), Some(10.0));
}

#[test]
fn unsupported_property_is_skipped() {
    let backend = SimBackend::stereo_rig().without_property(port(2), PropertyId::ExposureTime);
    let mut camera = StereoCamera::open(backend, &config()).unwrap();

    let writes = camera.device().backend().writes().to_vec();
    assert!(!writes
        .iter()
        .any(|w| matches!(w, HwWrite::Float(SensorSelect::Sensor2, ..))));
    assert!(writes.contains(&HwWrite::Float(SensorSelect::Sensor1, PropertyId::ExposureTime, 8.0)));
    assert!(writes.contains(&HwWrite::Int(SensorSelect::Sensor2, PropertyId::GainMonochrome, 300)));

    let (left, right) = camera.grab_pair(Utc::now()).unwrap();
    assert_eq!(left.data.len(), right.data.len());
}

#[test]
fn mistyped_property_is_left_untouched() {
    let backend = SimBackend::stereo_rig().with_property(
        None,
        PropertyId::GainMonochrome,
        SimProperty::float(
            "Gain",
            PropertyAttribs {
                default: 1.0,
                min: 0.0,
                max: 16.0,
            },
        ),
    );
    let camera = StereoCamera::open(backend, &config()).unwrap();

    let writes = camera.device().backend().writes();
    assert!(!writes
        .iter()
        .any(|w| matches!(w, HwWrite::Int(..) | HwWrite::Float(_, PropertyId::GainMonochrome, _))));
    assert!(camera.device().is_streaming());
}

#[test]
fn settings_disabled_are_not_written() {
    let mut cfg = config();
    cfg.set_gain = false;
    cfg.set_exposure = false;
    cfg.gain_left = -4;

    let camera = StereoCamera::open(SimBackend::stereo_rig(), &cfg).unwrap();
    assert!(!camera
        .device()
        .backend()
        .writes()
        .iter()
        .any(|w| matches!(w, HwWrite::Int(..) | HwWrite::Float(..) | HwWrite::Bool(..))));
}

#[test]
fn negotiation_picks_first_bgr_entry() {
    let formats = vec![
        ImageFormat {
            width: 640,
            height: 480,
            color_format: ColorFormat::Gray8,
        },
        ImageFormat {
            width: 32,
            height: 16,
            color_format: ColorFormat::Bgr3x8,
        },
        ImageFormat {
            width: 64,
            height: 32,
            color_format: ColorFormat::Bgr3x8,
        },
    ];
    let backend = SimBackend::stereo_rig().with_target_formats(formats);
    let mut camera = StereoCamera::open(backend, &config()).unwrap();

    assert_eq!(camera.target_format().width(), 32);
    assert_eq!(camera.target_format().height(), 16);
    assert_eq!(camera.target_format().pitch(), 96);

    let frame = camera.grab_left(Utc::now()).unwrap();
    assert_eq!((frame.width, frame.height, frame.step), (32, 16, 96));
}

#[test]
fn negotiation_without_bgr_fails_before_configuring() {
    let backend = SimBackend::stereo_rig().with_target_formats(vec![ImageFormat {
        width: 754,
        height: 480,
        color_format: ColorFormat::Rgb3x8,
    }]);

    let err = StereoCamera::open(backend, &config()).err().unwrap();
    assert!(matches!(
        err,
        CameraError::TargetFormatUnavailable(ColorFormat::Bgr3x8)
    ));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn failed_negotiation_writes_nothing_after_select() {
    let backend = SimBackend::stereo_rig().with_target_formats(vec![
        ImageFormat {
            width: 754,
            height: 480,
            color_format: ColorFormat::Gray8,
        },
        ImageFormat {
            width: 754,
            height: 480,
            color_format: ColorFormat::Bgra4x8,
        },
    ]);
    let mut device = Device::open(backend, false).unwrap();

    let result = device.activate(port(1)).unwrap().select_target_format();
    assert!(matches!(
        result,
        Err(CameraError::TargetFormatUnavailable(ColorFormat::Bgr3x8))
    ));

    let writes = device.backend().writes();
    assert_eq!(writes.last(), Some(&HwWrite::SensorSelect(SensorSelect::Sensor1)));
    assert_eq!(
        writes,
        &[HwWrite::Open(1002), HwWrite::SensorSelect(SensorSelect::Sensor1)]
    );
}

#[test]
fn frames_are_tightly_packed() {
    let backend = SimBackend::stereo_rig()
        .with_resolution(33, 9)
        .with_padding(13);
    let mut camera = StereoCamera::open(backend, &config()).unwrap();

    for frame_number in 0..3u64 {
        for side in [Side::Left, Side::Right] {
            let frame = camera.grab(side, Utc::now()).unwrap();
            assert_eq!(frame.step, frame.width * 3);
            assert_eq!(frame.data.len(), (frame.height * frame.step) as usize);

            let p = camera.port(side);
            let expected: Vec<u8> = (0..frame.height)
                .flat_map(|y| {
                    (0..frame.width).flat_map(move |x| {
                        (0..3).map(move |c| pattern_value(p, frame_number, x, y, c))
                    })
                })
                .collect();
            assert_eq!(frame.data, expected, "{side} frame {frame_number}");
        }
    }
}

#[test]
fn padding_never_leaks_into_frames() {
    let backend = SimBackend::stereo_rig().with_resolution(20, 4).with_padding(12);
    let mut camera = StereoCamera::open(backend, &config()).unwrap();
    let frame = camera.grab_right(Utc::now()).unwrap();

    // 20 * 3 bytes of pattern per row; the padding run would be 12 bytes long.
    assert!(!frame
        .data
        .windows(12)
        .any(|w| w.iter().all(|&b| b == PADDING_BYTE)));
}

#[test]
fn timeout_is_fatal_and_reported() {
    let backend = SimBackend::stereo_rig().starved(port(2));
    let mut camera = StereoCamera::open(backend, &config()).unwrap();

    camera.grab_left(Utc::now()).unwrap();
    let err = camera.grab_right(Utc::now()).unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.kind(), ErrorKind::HardwareFault);
    assert_eq!(camera.device().backend().outstanding_images(), 0);
}

#[test]
fn dropped_frames_are_reported_per_port() {
    let backend = SimBackend::stereo_rig().with_dropped_frames(port(2), 4);
    let mut camera = StereoCamera::open(backend, &config()).unwrap();

    let (left, right) = camera.grab_pair(Utc::now()).unwrap();
    assert_eq!(left.frames_dropped, 0);
    assert_eq!(right.frames_dropped, 4);
}

#[test]
fn close_after_streaming_succeeds() {
    let camera = StereoCamera::open(SimBackend::stereo_rig(), &config()).unwrap();
    camera.close().unwrap();
}

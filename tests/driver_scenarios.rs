//! End-to-end scenarios against the driver's host-facing surface.
//!
//! Time is driven by a `ManualClock`; notifications are collected through a
//! `ChannelHost`.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use usb_audio_driver::{
    audio::{IoCycleInfo, IoOperation},
    config::DriverConfig,
    constants::{BYTES_PER_FRAME, RING_BUFFER_FRAMES, VOLUME_MAX_DB, VOLUME_MIN_DB},
    driver::ClientInfo,
    error::{status, status_of},
    host::{ChannelHost, HostClock, ManualClock, Notification},
    object::ObjectId,
    property::{PropertyAddress, Scope, Selector, StreamFormat, ELEMENT_MAIN},
    AudioServerPlugIn, Driver, DriverError,
};

const TICKS_PER_SECOND: f64 = 24_000_000.0;
const DEVICE: ObjectId = ObjectId::DEVICE;

struct Fixture {
    driver: Driver,
    clock: Arc<ManualClock>,
    notifications: Receiver<Notification>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(10_000, TICKS_PER_SECOND));
    let driver = Driver::new(DriverConfig::default(), clock.clone());
    let (host, notifications) = ChannelHost::new();
    driver.initialize(Arc::new(host)).unwrap();
    Fixture {
        driver,
        clock,
        notifications,
    }
}

fn global(selector: Selector) -> PropertyAddress {
    PropertyAddress::global(selector)
}

fn get_bytes(driver: &Driver, object: ObjectId, selector: Selector) -> Vec<u8> {
    let address = global(selector);
    let size = driver.get_property_data_size(object, &address, &[]).unwrap();
    let mut out = vec![0u8; size];
    let written = driver.get_property_data(object, &address, &[], &mut out).unwrap();
    out.truncate(written);
    out
}

fn get_u32(driver: &Driver, object: ObjectId, selector: Selector) -> u32 {
    u32::from_ne_bytes(get_bytes(driver, object, selector).try_into().unwrap())
}

fn get_f32(driver: &Driver, object: ObjectId, selector: Selector) -> f32 {
    f32::from_ne_bytes(get_bytes(driver, object, selector).try_into().unwrap())
}

fn get_f64(driver: &Driver, object: ObjectId, selector: Selector) -> f64 {
    f64::from_ne_bytes(get_bytes(driver, object, selector).try_into().unwrap())
}

fn get_ids(driver: &Driver, object: ObjectId, address: PropertyAddress) -> Vec<u32> {
    let size = driver.get_property_data_size(object, &address, &[]).unwrap();
    let mut out = vec![0u8; size];
    driver.get_property_data(object, &address, &[], &mut out).unwrap();
    out.chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn get_text(driver: &Driver, object: ObjectId, selector: Selector) -> String {
    String::from_utf8(get_bytes(driver, object, selector)).unwrap()
}

#[test]
fn unknown_object_fails_everything() {
    let f = fixture();
    let bogus = ObjectId(99);
    let address = global(Selector::NAME);
    let mut out = [0u8; 64];

    assert!(!f.driver.has_property(bogus, &address));
    assert!(matches!(
        f.driver.is_property_settable(bogus, &address),
        Err(DriverError::NotFound(_))
    ));
    assert!(matches!(
        f.driver.get_property_data_size(bogus, &address, &[]),
        Err(DriverError::NotFound(_))
    ));
    assert!(matches!(
        f.driver.get_property_data(bogus, &address, &[], &mut out),
        Err(DriverError::NotFound(_))
    ));
    let result = f.driver.set_property_data(bogus, &address, &[], b"x");
    assert_eq!(status_of(&result), status::BAD_OBJECT);
    assert!(matches!(f.driver.start_io(bogus, 1), Err(DriverError::NotFound(_))));
    assert!(f.notifications.try_recv().is_err());
}

#[test]
fn missing_property_fails_every_access() {
    let f = fixture();
    let address = global(Selector::BOOLEAN_VALUE);
    let object = ObjectId::VOLUME_INPUT;
    let mut out = [0u8; 4];

    assert!(!f.driver.has_property(object, &address));
    for result in [
        f.driver.is_property_settable(object, &address).map(|_| ()),
        f.driver.get_property_data_size(object, &address, &[]).map(|_| ()),
        f.driver.get_property_data(object, &address, &[], &mut out).map(|_| ()),
        f.driver.set_property_data(object, &address, &[], &[1, 0, 0, 0]).map(|_| ()),
    ] {
        assert!(matches!(result, Err(DriverError::UnsupportedProperty { .. })));
    }
}

#[test]
fn repeated_reads_are_identical() {
    let f = fixture();
    for object in ObjectId::ALL {
        for selector in [Selector::CLASS, Selector::OWNER, Selector::OWNED_OBJECTS] {
            let first = get_bytes(&f.driver, object, selector);
            let second = get_bytes(&f.driver, object, selector);
            assert_eq!(first, second, "{} {}", object, selector);
        }
    }
}

#[test]
fn object_tree() {
    let f = fixture();
    let owned = get_ids(&f.driver, ObjectId::PLUGIN, global(Selector::OWNED_OBJECTS));
    assert_eq!(owned, vec![ObjectId::BOX.0, ObjectId::DEVICE.0]);

    let all = get_ids(&f.driver, DEVICE, global(Selector::OWNED_OBJECTS));
    assert_eq!(all.len(), 8);
    let input_only = get_ids(
        &f.driver,
        DEVICE,
        PropertyAddress::new(Selector::OWNED_OBJECTS, Scope::Input, ELEMENT_MAIN),
    );
    assert_eq!(input_only, vec![4, 5, 6, 7]);

    let streams = get_ids(
        &f.driver,
        DEVICE,
        PropertyAddress::new(Selector::STREAMS, Scope::Output, ELEMENT_MAIN),
    );
    assert_eq!(streams, vec![ObjectId::STREAM_OUTPUT.0]);

    assert_eq!(get_u32(&f.driver, ObjectId::MUTE_OUTPUT, Selector::OWNER), DEVICE.0);
    assert_eq!(get_text(&f.driver, DEVICE, Selector::DEVICE_UID), "USBAudioDevice_UID");
}

#[test]
fn volume_round_trip_clamps() {
    let f = fixture();
    let address = global(Selector::DECIBEL_VALUE);
    let object = ObjectId::VOLUME_OUTPUT;

    for (requested, expected) in [(-20.0f32, -20.0f32), (40.0, VOLUME_MAX_DB), (-500.0, VOLUME_MIN_DB)] {
        f.driver
            .set_property_data(object, &address, &[], &requested.to_ne_bytes())
            .unwrap();
        assert_eq!(get_f32(&f.driver, object, Selector::DECIBEL_VALUE), expected);
    }
    assert_eq!(get_f32(&f.driver, object, Selector::SCALAR_VALUE), 0.0);

    let changed = f
        .driver
        .set_property_data(
            object,
            &global(Selector::SCALAR_VALUE),
            &[],
            &1.0f32.to_ne_bytes(),
        )
        .unwrap();
    assert!(changed.contains(Selector::SCALAR_VALUE));
    assert!(changed.contains(Selector::DECIBEL_VALUE));
    assert_eq!(get_f32(&f.driver, object, Selector::DECIBEL_VALUE), VOLUME_MAX_DB);

    // input side untouched
    assert_eq!(get_f32(&f.driver, ObjectId::VOLUME_INPUT, Selector::DECIBEL_VALUE), 0.0);
}

#[test]
fn non_finite_volume_is_rejected() {
    let f = fixture();
    let result = f.driver.set_property_data(
        ObjectId::VOLUME_INPUT,
        &global(Selector::DECIBEL_VALUE),
        &[],
        &f32::NAN.to_ne_bytes(),
    );
    assert!(matches!(result, Err(DriverError::IllegalOperation(_))));
    assert_eq!(get_f32(&f.driver, ObjectId::VOLUME_INPUT, Selector::DECIBEL_VALUE), 0.0);
}

#[test]
fn volume_size_and_short_buffer() {
    let f = fixture();
    let address = global(Selector::DECIBEL_VALUE);
    let object = ObjectId::VOLUME_INPUT;
    assert_eq!(
        f.driver.get_property_data_size(object, &address, &[]).unwrap(),
        std::mem::size_of::<f32>()
    );
    let mut short = [0u8; 3];
    assert!(matches!(
        f.driver.get_property_data(object, &address, &[], &mut short),
        Err(DriverError::BadPropertySize { expected: 4, actual: 3 })
    ));

    let result = f
        .driver
        .set_property_data(object, &address, &[], &[0u8; 3]);
    assert!(matches!(result, Err(DriverError::BadPropertySize { .. })));
}

#[test]
fn mute_and_data_source() {
    let f = fixture();
    let changed = f
        .driver
        .set_property_data(
            ObjectId::MUTE_INPUT,
            &global(Selector::BOOLEAN_VALUE),
            &[],
            &1u32.to_ne_bytes(),
        )
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(get_u32(&f.driver, ObjectId::MUTE_INPUT, Selector::BOOLEAN_VALUE), 1);

    let notification = f.notifications.try_recv().unwrap();
    assert_eq!(notification.object, ObjectId::MUTE_INPUT);

    // setting the same value reports nothing and notifies nobody
    let changed = f
        .driver
        .set_property_data(
            ObjectId::MUTE_INPUT,
            &global(Selector::BOOLEAN_VALUE),
            &[],
            &1u32.to_ne_bytes(),
        )
        .unwrap();
    assert!(changed.is_empty());
    assert!(f.notifications.try_recv().is_err());

    let result = f.driver.set_property_data(
        ObjectId::DATA_SOURCE_OUTPUT,
        &global(Selector::CURRENT_ITEM),
        &[],
        &5u32.to_ne_bytes(),
    );
    assert!(matches!(result, Err(DriverError::IllegalOperation(_))));

    let address = global(Selector::ITEM_NAME);
    let mut out = [0u8; 64];
    let written = f
        .driver
        .get_property_data(ObjectId::DATA_SOURCE_OUTPUT, &address, &0u32.to_ne_bytes(), &mut out)
        .unwrap();
    assert_eq!(&out[..written], b"iAudio USB Device 1");
    assert!(matches!(
        f.driver
            .get_property_data(ObjectId::DATA_SOURCE_OUTPUT, &address, &[0u8; 2], &mut out),
        Err(DriverError::BadPropertySize { .. })
    ));
}

#[test]
fn sample_rate_change_while_idle() {
    let f = fixture();
    let address = global(Selector::NOMINAL_SAMPLE_RATE);
    let changed = f
        .driver
        .set_property_data(DEVICE, &address, &[], &44_100.0f64.to_ne_bytes())
        .unwrap();
    assert!(changed.contains(Selector::NOMINAL_SAMPLE_RATE));
    assert_eq!(get_f64(&f.driver, DEVICE, Selector::NOMINAL_SAMPLE_RATE), 44_100.0);

    let notification = f.notifications.try_recv().unwrap();
    assert_eq!(notification.object, DEVICE);
    assert_eq!(notification.addresses, vec![address]);
}

#[test]
fn sample_rate_change_while_running_is_busy() {
    let f = fixture();
    let address = global(Selector::NOMINAL_SAMPLE_RATE);
    f.driver.start_io(DEVICE, 1).unwrap();
    let before = f.driver.snapshot();

    for rate in [44_100.0f64, 32_000.0] {
        let result = f
            .driver
            .set_property_data(DEVICE, &address, &[], &rate.to_ne_bytes());
        assert!(matches!(result, Err(DriverError::Busy)));
        assert_eq!(status_of(&result), status::NOT_READY);
    }
    assert_eq!(f.driver.snapshot().sample_rate, before.sample_rate);
    assert_eq!(get_u32(&f.driver, DEVICE, Selector::DEVICE_IS_RUNNING), 1);
}

#[test]
fn stream_format_set() {
    let f = fixture();
    let address = global(Selector::VIRTUAL_FORMAT);
    let format = StreamFormat::pcm16(44_100.0);
    let changed = f
        .driver
        .set_property_data(ObjectId::STREAM_INPUT, &address, &[], &format.encode())
        .unwrap();
    assert_eq!(changed.len(), 2);
    assert_eq!(get_f64(&f.driver, DEVICE, Selector::NOMINAL_SAMPLE_RATE), 44_100.0);

    let mut stereo = format;
    stereo.channels_per_frame = 2;
    let result = f
        .driver
        .set_property_data(ObjectId::STREAM_INPUT, &address, &[], &stereo.encode());
    assert!(matches!(result, Err(DriverError::UnsupportedFormat(_))));
}

#[test]
fn start_stop_reference_counting() {
    let f = fixture();
    let clients = 4;
    for client in 0..clients {
        f.driver.start_io(DEVICE, client).unwrap();
        f.clock.advance(1_000);
    }
    let anchor = f.driver.snapshot().engine.anchor;
    assert!(anchor.is_some());

    for client in 1..clients {
        f.driver.stop_io(DEVICE, client).unwrap();
    }
    let snapshot = f.driver.snapshot();
    assert!(snapshot.io_running);
    assert_eq!(snapshot.engine.anchor, anchor);

    f.driver.stop_io(DEVICE, 0).unwrap();
    let snapshot = f.driver.snapshot();
    assert!(!snapshot.io_running);
    assert_eq!(snapshot.engine.anchor, None);
    assert!(matches!(f.driver.stop_io(DEVICE, 0), Err(DriverError::NotRunning)));

    let running: Vec<_> = f.notifications.try_iter().collect();
    assert_eq!(running.len(), 2);
}

#[test]
fn stop_from_idle_client_leaves_other_session_running() {
    let f = fixture();
    for client_id in [1, 2] {
        let client = ClientInfo {
            client_id,
            pid: 100 + client_id as i32,
            bundle_id: None,
        };
        f.driver.add_device_client(DEVICE, &client).unwrap();
    }
    f.driver.start_io(DEVICE, 1).unwrap();
    let before = f.driver.snapshot();
    f.clock.advance(5_000);

    assert!(matches!(
        f.driver.stop_io(DEVICE, 2),
        Err(DriverError::IllegalOperation(_))
    ));
    let after = f.driver.snapshot();
    assert!(after.io_running);
    assert_eq!(after.engine.anchor, before.engine.anchor);
    assert_eq!(after.engine.seed, before.engine.seed);
    assert_eq!(after.engine.running_clients, 1);
    assert_eq!(after.clients[0].1.io_starts, 1);
    assert_eq!(after.clients[1].1.io_starts, 0);

    f.driver.stop_io(DEVICE, 1).unwrap();
    let snapshot = f.driver.snapshot();
    assert!(!snapshot.io_running);
    assert_eq!(snapshot.clients[0].1.io_starts, 0);
}

#[test]
fn zero_timestamps_are_monotonic_within_a_session() {
    let f = fixture();
    assert!(matches!(
        f.driver.get_zero_timestamp(DEVICE, 1),
        Err(DriverError::NotRunning)
    ));

    f.driver.start_io(DEVICE, 1).unwrap();
    let mut previous = f.driver.get_zero_timestamp(DEVICE, 1).unwrap();
    for _ in 0..50 {
        f.clock.advance(1_234_567);
        let now = f.clock.now();
        let zts = f.driver.get_zero_timestamp(DEVICE, 1).unwrap();
        assert!(zts.sample_time >= previous.sample_time);
        assert!(zts.host_time >= previous.host_time);
        assert!(zts.host_time <= now);
        assert_eq!(zts.seed, previous.seed);
        previous = zts;
    }

    f.driver.stop_io(DEVICE, 1).unwrap();
    f.driver.start_io(DEVICE, 1).unwrap();
    let restarted = f.driver.get_zero_timestamp(DEVICE, 1).unwrap();
    assert!(restarted.seed > previous.seed);
    assert_eq!(restarted.sample_time, 0.0);
}

#[test]
fn io_cycle_moves_bytes() {
    let f = fixture();
    f.driver.start_io(DEVICE, 1).unwrap();
    let cycle = IoCycleInfo::default();
    let frames = 256u32;
    let len = frames as usize * BYTES_PER_FRAME as usize;

    let mut output: Vec<u8> = (0..len).map(|i| i as u8).collect();
    f.driver
        .begin_io_operation(DEVICE, 1, IoOperation::WriteMix, frames, &cycle)
        .unwrap();
    f.driver
        .do_io_operation(
            DEVICE,
            ObjectId::STREAM_OUTPUT,
            1,
            IoOperation::WriteMix,
            frames,
            &cycle,
            &mut output,
        )
        .unwrap();
    f.driver
        .end_io_operation(DEVICE, 1, IoOperation::WriteMix, frames, &cycle)
        .unwrap();
    assert_eq!(f.driver.snapshot().engine.ring.remaining, len);

    let mut tap = vec![0u8; len];
    assert_eq!(f.driver.read_output_tap(&mut tap), len);
    assert_eq!(tap, output);

    let mut input = vec![0x55u8; len];
    f.driver
        .do_io_operation(
            DEVICE,
            ObjectId::STREAM_INPUT,
            1,
            IoOperation::ReadInput,
            frames,
            &cycle,
            &mut input,
        )
        .unwrap();
    assert!(input.iter().all(|&b| b == 0));

    // declined operations succeed without touching the buffer
    let mut untouched = vec![0x77u8; len];
    assert!(!f
        .driver
        .will_do_io_operation(DEVICE, 1, IoOperation::MixOutput)
        .unwrap()
        .will_do);
    f.driver
        .do_io_operation(
            DEVICE,
            ObjectId::STREAM_OUTPUT,
            1,
            IoOperation::MixOutput,
            frames,
            &cycle,
            &mut untouched,
        )
        .unwrap();
    assert!(untouched.iter().all(|&b| b == 0x77));

    let stats = f.driver.snapshot().engine.stats;
    assert_eq!(stats.frames_written, frames as u64);
    assert_eq!(stats.frames_read, frames as u64);
}

#[test]
fn oversized_io_is_rejected_without_side_effects() {
    let f = fixture();
    f.driver.start_io(DEVICE, 1).unwrap();
    let cycle = IoCycleInfo::default();
    let mut small = vec![1u8; 64];
    f.driver
        .do_io_operation(
            DEVICE,
            ObjectId::STREAM_OUTPUT,
            1,
            IoOperation::WriteMix,
            32,
            &cycle,
            &mut small,
        )
        .unwrap();
    let before = f.driver.snapshot().engine.ring;

    let frames = RING_BUFFER_FRAMES + 1;
    let mut big = vec![0u8; frames as usize * BYTES_PER_FRAME as usize];
    let result = f.driver.do_io_operation(
        DEVICE,
        ObjectId::STREAM_OUTPUT,
        1,
        IoOperation::WriteMix,
        frames,
        &cycle,
        &mut big,
    );
    assert!(matches!(result, Err(DriverError::BufferOverrun { .. })));
    assert_eq!(f.driver.snapshot().engine.ring, before);
    assert_eq!(f.driver.snapshot().engine.stats.overruns, 1);
}

#[test]
fn io_while_idle_is_not_running() {
    let f = fixture();
    let cycle = IoCycleInfo::default();
    let mut buffer = [0u8; 8];
    let result = f.driver.do_io_operation(
        DEVICE,
        ObjectId::STREAM_INPUT,
        1,
        IoOperation::ReadInput,
        4,
        &cycle,
        &mut buffer,
    );
    assert_eq!(status_of(&result), status::NOT_RUNNING);
}

#[test]
fn box_acquisition_hides_device() {
    let f = fixture();
    assert_eq!(
        get_ids(&f.driver, ObjectId::PLUGIN, global(Selector::DEVICE_LIST)),
        vec![DEVICE.0]
    );
    let changed = f
        .driver
        .set_property_data(ObjectId::BOX, &global(Selector::ACQUIRED), &[], &0u32.to_ne_bytes())
        .unwrap();
    assert_eq!(changed.len(), 2);
    assert!(get_ids(&f.driver, ObjectId::PLUGIN, global(Selector::DEVICE_LIST)).is_empty());
    assert!(get_ids(&f.driver, ObjectId::BOX, global(Selector::BOX_DEVICE_LIST)).is_empty());
}

#[test]
fn translate_uid() {
    let f = fixture();
    let address = global(Selector::TRANSLATE_UID_TO_DEVICE);
    let mut out = [0u8; 4];
    f.driver
        .get_property_data(ObjectId::PLUGIN, &address, b"USBAudioDevice_UID", &mut out)
        .unwrap();
    assert_eq!(u32::from_ne_bytes(out), DEVICE.0);

    f.driver
        .get_property_data(ObjectId::PLUGIN, &address, b"someone else", &mut out)
        .unwrap();
    assert_eq!(u32::from_ne_bytes(out), ObjectId::UNKNOWN.0);

    assert!(matches!(
        f.driver.get_property_data(ObjectId::PLUGIN, &address, &[], &mut out),
        Err(DriverError::BadPropertySize { .. })
    ));
}

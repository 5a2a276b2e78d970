// Read boundary: file-like device and the C ABI over it.
// Run with: cargo test --test device_ffi -- --nocapture

use mgcap::Capture::Structs::{SlotHeader, SLOT_SIZE};
use mgcap::Capture::{CaptureBuilder, CaptureDevice, FrameHandler};
use mgcap::CaptureError;
use mgcap::ffi::*;
use std::io::Read;

fn device_with_frames(n: u64) -> (CaptureDevice, Vec<mgcap::Capture::FrameIngestor>) {
    let set = CaptureBuilder::new()
        .with_workers(2)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, mut ingestors, mut readers) = set.into_parts();
    for ts in 0..n {
        ingestors[0].on_frame(&[0x77; 64], ts);
    }
    // Only worker 0 is exposed.
    let reader = readers.remove(0);
    (CaptureDevice::new(reader), ingestors)
}

#[test]
fn test_device_reads_raw_records() {
    let (mut dev, _ingestors) = device_with_frames(3);
    assert_eq!(dev.worker(), 0);

    let mut buf = vec![0u8; 2 * SLOT_SIZE];
    assert_eq!(dev.read(&mut buf).unwrap(), 2 * SLOT_SIZE);
    assert_eq!(SlotHeader::read_from(&buf).unwrap().capture_timestamp, 0);
    assert_eq!(dev.read(&mut buf).unwrap(), SLOT_SIZE);
    assert_eq!(SlotHeader::read_from(&buf).unwrap().capture_timestamp, 2);
    // Empty ring: returns 0 immediately.
    assert_eq!(dev.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_device_rejects_misaligned_reads() {
    let (mut dev, _ingestors) = device_with_frames(1);
    let mut buf = vec![0u8; 100];
    let err = dev.read(&mut buf).unwrap_err();
    assert!(matches!(err, CaptureError::InvalidArgument(_)));

    // Through io::Read the same failure is InvalidInput.
    let err = Read::read(&mut dev, &mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

    let mut buf = vec![0u8; SLOT_SIZE];
    assert_eq!(Read::read(&mut dev, &mut buf).unwrap(), SLOT_SIZE);
}

#[test]
fn test_device_poll_and_control_are_unsupported() {
    let (mut dev, _ingestors) = device_with_frames(0);
    assert!(matches!(dev.poll(), Err(CaptureError::Unsupported(_))));
    assert!(matches!(dev.control(1, 0), Err(CaptureError::Unsupported(_))));
}

#[test]
fn test_ffi_lifecycle() {
    let handle = mgcap_open(12, 2);
    assert!(!handle.is_null());

    let frame = [0x42u8; 64];
    assert_eq!(mgcap_on_frame(handle, 0, frame.as_ptr(), frame.len(), 9), 0);
    assert_eq!(mgcap_on_frame(handle, 1, frame.as_ptr(), frame.len(), 10), 0);
    assert_eq!(mgcap_on_frame(handle, 0, frame.as_ptr(), 0, 11), -3);
    assert_eq!(mgcap_on_frame(handle, 5, frame.as_ptr(), frame.len(), 12), -2);
    assert_eq!(mgcap_on_frame(handle, 0, std::ptr::null(), 64, 13), -1);

    let mut buf = vec![0u8; 4 * SLOT_SIZE];
    assert_eq!(mgcap_read(handle, buf.as_mut_ptr(), 100), -2);
    // Worker 1's frame is not visible through the read boundary.
    assert_eq!(mgcap_read(handle, buf.as_mut_ptr(), buf.len()), SLOT_SIZE as isize);
    assert_eq!(SlotHeader::read_from(&buf).unwrap().capture_timestamp, 9);
    assert_eq!(mgcap_read(handle, buf.as_mut_ptr(), buf.len()), 0);

    assert_eq!(mgcap_poll(handle), -5);
    assert_eq!(mgcap_ioctl(handle, 0, 0), -5);
    assert_eq!(mgcap_dropped(handle), 0);

    mgcap_close(handle);
}

#[test]
fn test_ffi_null_handles() {
    assert_eq!(mgcap_on_frame(std::ptr::null_mut(), 0, [0u8].as_ptr(), 1, 0), -1);
    assert_eq!(mgcap_read(std::ptr::null_mut(), std::ptr::null_mut(), 0), -1);
    assert_eq!(mgcap_poll(std::ptr::null_mut()), -1);
    assert_eq!(mgcap_ioctl(std::ptr::null_mut(), 0, 0), -1);
    assert_eq!(mgcap_dropped(std::ptr::null()), 0);
    mgcap_close(std::ptr::null_mut());
}

#[test]
fn test_ffi_open_rejects_bad_order() {
    assert!(mgcap_open(3, 1).is_null());
    assert!(mgcap_open(12, 65).is_null());
}

use crate::Capture::{CaptureBuilder, CaptureDevice, FrameHandler, FrameIngestor, Verdict};
use crate::Core::alloc::RingArena;
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::ptr;
use std::sync::Arc;

// Error codes
const MGCAP_SUCCESS: i32 = 0;
const MGCAP_ERROR_NULL_POINTER: i32 = -1;
const MGCAP_ERROR_INVALID_ARG: i32 = -2;
const MGCAP_ERROR_REJECTED: i32 = -3;
const MGCAP_ERROR_BUSY: i32 = -4;
const MGCAP_ERROR_UNSUPPORTED: i32 = -5;
const MGCAP_ERROR_INTERNAL: i32 = -6;

/// Handle to an open capture instance (opaque pointer)
pub struct CaptureHandle {
    arena: Arc<RingArena>,
    // One lock per worker; an uncontended try_lock is the expected case.
    ingestors: Vec<Mutex<FrameIngestor>>,
    device: Mutex<CaptureDevice>,
}

fn error_code(err: &CaptureError) -> i32 {
    match err {
        CaptureError::InvalidArgument(_) => MGCAP_ERROR_INVALID_ARG,
        CaptureError::Unsupported(_) => MGCAP_ERROR_UNSUPPORTED,
        _ => MGCAP_ERROR_INTERNAL,
    }
}

/// Allocate rings and open the read boundary on worker 0.
///
/// # Arguments
/// * `ring_order` - Ring capacity is `1 << ring_order` bytes (0 = default).
/// * `workers` - Number of per-worker rings (0 = one per CPU).
///
/// # Returns
/// * Pointer to `CaptureHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn mgcap_open(ring_order: u32, workers: u32) -> *mut CaptureHandle {
    let mut builder = CaptureBuilder::new();
    if ring_order != 0 {
        builder = builder.with_ring_order(ring_order);
    }
    if workers != 0 {
        builder = builder.with_workers(workers as usize);
    }

    let set = match builder.build() {
        Ok(set) => set,
        Err(e) => {
            tracing::error!(error = %e, "mgcap_open failed");
            return ptr::null_mut();
        }
    };
    let (arena, ingestors, mut readers) = set.into_parts();
    // Only worker 0 is exposed through the read boundary.
    readers.truncate(1);
    let Some(reader) = readers.pop() else {
        return ptr::null_mut();
    };

    let handle = Box::new(CaptureHandle {
        arena,
        ingestors: ingestors.into_iter().map(Mutex::new).collect(),
        device: Mutex::new(CaptureDevice::new(reader)),
    });
    Box::into_raw(handle)
}

/// Deliver one frame.
///
/// # Returns
/// * 0 if the frame was accepted (including dropped on a full ring).
/// * MGCAP_ERROR_REJECTED if the frame cannot be recorded.
/// * MGCAP_ERROR_BUSY if another caller is using the same worker.
#[no_mangle]
pub extern "C" fn mgcap_on_frame(
    handle: *mut CaptureHandle,
    worker: u32,
    data: *const u8,
    len: usize,
    timestamp_ns: u64,
) -> i32 {
    if handle.is_null() || data.is_null() {
        return MGCAP_ERROR_NULL_POINTER;
    }
    let handle = unsafe { &*handle };
    let Some(slot) = handle.ingestors.get(worker as usize) else {
        return MGCAP_ERROR_INVALID_ARG;
    };
    // Never block the delivery context.
    let Some(mut ingestor) = slot.try_lock() else {
        return MGCAP_ERROR_BUSY;
    };
    let frame = unsafe { std::slice::from_raw_parts(data, len) };
    match ingestor.on_frame(frame, timestamp_ns) {
        Verdict::Accepted => MGCAP_SUCCESS,
        Verdict::Rejected => MGCAP_ERROR_REJECTED,
    }
}

/// Read raw slot records from worker 0.
///
/// # Returns
/// * Number of bytes copied (0 if nothing is pending).
/// * Negative error code; `len` must be a multiple of the slot size.
#[no_mangle]
pub extern "C" fn mgcap_read(handle: *mut CaptureHandle, buf: *mut u8, len: usize) -> isize {
    if handle.is_null() || buf.is_null() {
        return MGCAP_ERROR_NULL_POINTER as isize;
    }
    let handle = unsafe { &*handle };
    let out = unsafe { std::slice::from_raw_parts_mut(buf, len) };
    match handle.device.lock().read(out) {
        Ok(n) => n as isize,
        Err(e) => error_code(&e) as isize,
    }
}

/// Readiness query. Not implemented; always MGCAP_ERROR_UNSUPPORTED.
#[no_mangle]
pub extern "C" fn mgcap_poll(handle: *mut CaptureHandle) -> i32 {
    if handle.is_null() {
        return MGCAP_ERROR_NULL_POINTER;
    }
    let handle = unsafe { &*handle };
    match handle.device.lock().poll() {
        Ok(_) => MGCAP_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Out-of-band control. Not implemented; always MGCAP_ERROR_UNSUPPORTED.
#[no_mangle]
pub extern "C" fn mgcap_ioctl(handle: *mut CaptureHandle, cmd: u32, arg: u64) -> i32 {
    if handle.is_null() {
        return MGCAP_ERROR_NULL_POINTER;
    }
    let handle = unsafe { &*handle };
    match handle.device.lock().control(cmd, arg) {
        Ok(()) => MGCAP_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Frames dropped on full rings across every worker.
#[no_mangle]
pub extern "C" fn mgcap_dropped(handle: *const CaptureHandle) -> u64 {
    if handle.is_null() {
        return 0;
    }
    unsafe { (*handle).arena.dropped_total() }
}

/// Free a capture handle.
#[no_mangle]
pub extern "C" fn mgcap_close(handle: *mut CaptureHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}

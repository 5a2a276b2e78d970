use crate::Capture::Buffer::layout::{
    GlobalHeader, RingEntry, ARENA_MAGIC, ARENA_VERSION, CLAIM_CONSUMER, CLAIM_PRODUCER,
    MAX_WORKERS,
};
use crate::Capture::Buffer::CaptureRing;
use crate::Capture::Structs::SLOT_SIZE;
use crate::Core::SharedMemory::{self, SharedMemoryBackend};
use crate::error::{CaptureError, Result};
use std::mem::size_of;
use std::ptr::{self, addr_of_mut};
use std::sync::atomic::Ordering;
use tracing::{debug, info};
mod debug;
mod getters;

/// Geometry shared by every ring in an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    /// Logical ring size in bytes, a power of two.
    pub capacity: usize,
    /// Spill room past `capacity`.
    pub slack: usize,
}

impl RingGeometry {
    pub fn new(capacity: usize, slack: usize) -> Result<Self> {
        if !capacity.is_power_of_two() || capacity < SLOT_SIZE {
            return Err(CaptureError::invalid(format!(
                "ring capacity {} must be a power of two of at least {} bytes",
                capacity, SLOT_SIZE
            )));
        }
        if slack < SLOT_SIZE {
            return Err(CaptureError::invalid(format!(
                "ring slack {} must hold at least one {} byte slot",
                slack, SLOT_SIZE
            )));
        }
        Ok(Self { capacity, slack })
    }

    /// Band stride, rounded to the region alignment.
    fn band_size(&self) -> usize {
        align_up(self.capacity + self.slack)
    }
}

fn align_up(n: usize) -> usize {
    (n + SharedMemory::REGION_ALIGN - 1) & !(SharedMemory::REGION_ALIGN - 1)
}

fn header_size() -> usize {
    align_up(size_of::<GlobalHeader>())
}

/// One memory region holding a header plus one ring band per worker.
///
/// Rings are allocated once at start and never resized; the arena is
/// dropped after every producer and consumer handle is gone.
pub struct RingArena {
    shm: Box<dyn SharedMemoryBackend>,
    header: *mut GlobalHeader,
}

impl RingArena {
    /// Bytes an arena with this shape needs.
    pub fn required_size(workers: usize, geometry: RingGeometry) -> usize {
        header_size() + workers * geometry.band_size()
    }

    /// Create a process-private arena.
    pub fn new_heap(workers: usize, geometry: RingGeometry) -> Result<Self> {
        Self::check_workers(workers)?;
        let size = Self::required_size(workers, geometry);
        let shm = SharedMemory::create_heap_memory(size)
            .map_err(|e| CaptureError::unavailable("ring memory", e))?;
        Self::init(shm, workers, geometry)
    }

    /// Create an arena in /dev/shm so that another process can attach a consumer.
    pub fn create_shared(name: &str, workers: usize, geometry: RingGeometry) -> Result<Self> {
        Self::check_workers(workers)?;
        let size = Self::required_size(workers, geometry);
        let shm = SharedMemory::create_shared_memory(size, name)
            .map_err(|e| CaptureError::unavailable(format!("shared ring memory {:?}", name), e))?;
        Self::init(shm, workers, geometry)
    }

    /// Attach to an arena created by [`RingArena::create_shared`].
    pub fn attach_shared(name: &str) -> Result<Self> {
        let shm = SharedMemory::attach_shared_memory(name)
            .map_err(|e| CaptureError::unavailable(format!("shared ring memory {:?}", name), e))?;

        if shm.size() < size_of::<GlobalHeader>() {
            return Err(CaptureError::invalid("shared memory too small for arena header"));
        }
        let header = shm.as_ptr() as *mut GlobalHeader;

        // Safety: the region is at least one header long and page aligned.
        unsafe {
            if (*header).magic != ARENA_MAGIC {
                return Err(CaptureError::invalid(
                    "invalid magic number - shared memory is not a ring arena",
                ));
            }
            if (*header).version != ARENA_VERSION || (*header).slot_size as usize != SLOT_SIZE {
                return Err(CaptureError::invalid(format!(
                    "arena version {} / slot size {} do not match {} / {}",
                    (*header).version,
                    (*header).slot_size,
                    ARENA_VERSION,
                    SLOT_SIZE
                )));
            }
            if ((*header).total_size as usize) > shm.size() {
                return Err(CaptureError::invalid("shared memory shorter than arena"));
            }
            Self::check_rings(&*header)?;
            info!(name, workers = (*header).worker_count, "attached to ring arena");
        }

        Ok(Self { shm, header })
    }

    /// Reject a header whose ring entries would index or point outside the
    /// region. Everything `ring()` derives a pointer from is checked here.
    fn check_rings(header: &GlobalHeader) -> Result<()> {
        let workers = header.worker_count as usize;
        Self::check_workers(workers)?;

        let total = header.total_size;
        let bands_start = header_size() as u64;
        for (worker, entry) in header.rings[..workers].iter().enumerate() {
            RingGeometry::new(entry.capacity as usize, entry.slack as usize).map_err(|e| {
                CaptureError::invalid(format!("worker {} ring entry: {}", worker, e))
            })?;
            if entry.worker_id as usize != worker {
                return Err(CaptureError::invalid(format!(
                    "ring entry {} claims worker id {}",
                    worker, entry.worker_id
                )));
            }
            let end = entry
                .band_offset
                .checked_add(entry.capacity)
                .and_then(|n| n.checked_add(entry.slack));
            match end {
                Some(end) if entry.band_offset >= bands_start && end <= total => {}
                _ => {
                    return Err(CaptureError::invalid(format!(
                        "worker {} band at offset {} ({} + {} bytes) lies outside the {} byte arena",
                        worker, entry.band_offset, entry.capacity, entry.slack, total
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_workers(workers: usize) -> Result<()> {
        if workers == 0 || workers > MAX_WORKERS {
            return Err(CaptureError::invalid(format!(
                "worker count {} must be in 1..={}",
                workers, MAX_WORKERS
            )));
        }
        Ok(())
    }

    fn init(
        shm: Box<dyn SharedMemoryBackend>,
        workers: usize,
        geometry: RingGeometry,
    ) -> Result<Self> {
        let header = shm.as_ptr() as *mut GlobalHeader;
        if (header as usize) % SharedMemory::REGION_ALIGN != 0 {
            return Err(CaptureError::invalid("ring memory not properly aligned"));
        }

        // Safety: the region is zero-filled and large enough for the header
        // and every band. Zero is a valid bit pattern for every field, so
        // plain field writes are enough.
        unsafe {
            for i in 0..workers {
                let entry: *mut RingEntry = addr_of_mut!((*header).rings[i]);
                (*entry).worker_id = i as u32;
                (*entry).capacity = geometry.capacity as u64;
                (*entry).slack = geometry.slack as u64;
                (*entry).band_offset = (header_size() + i * geometry.band_size()) as u64;
            }
            addr_of_mut!((*header).version).write(ARENA_VERSION);
            addr_of_mut!((*header).slot_size).write(SLOT_SIZE as u32);
            addr_of_mut!((*header).worker_count).write(workers as u32);
            addr_of_mut!((*header).total_size).write(shm.size() as u64);
            // Magic last: an attacher only trusts a fully written header.
            ptr::write_volatile(addr_of_mut!((*header).magic), ARENA_MAGIC);
        }

        debug!(
            workers,
            capacity = geometry.capacity,
            slack = geometry.slack,
            size = shm.size(),
            "ring arena initialized"
        );
        Ok(Self { shm, header })
    }

    fn entry(&self, worker: usize) -> Option<&RingEntry> {
        if worker >= self.worker_count() {
            return None;
        }
        // Safety: header was validated in init/attach.
        unsafe { (*self.header).rings.get(worker) }
    }

    /// Number of rings in this arena.
    pub fn worker_count(&self) -> usize {
        unsafe { (*self.header).worker_count as usize }
    }

    /// A view of a worker's ring, usable for the read-only queries.
    pub fn ring(&self, worker: usize) -> Option<CaptureRing> {
        let entry = self.entry(worker)?;
        // Safety: band_offset + capacity + slack lies inside the region.
        let band = unsafe { self.shm.as_ptr().add(entry.band_offset as usize) };
        Some(unsafe { CaptureRing::new(entry, band) })
    }

    pub fn geometry(&self) -> Option<RingGeometry> {
        self.entry(0).map(|e| RingGeometry {
            capacity: e.capacity as usize,
            slack: e.slack as usize,
        })
    }

    /// Sum of the dropped-record counters of every ring.
    pub fn dropped_total(&self) -> u64 {
        (0..self.worker_count())
            .filter_map(|w| self.entry(w))
            .map(|e| e.dropped.load(Ordering::Relaxed))
            .sum()
    }

    fn claim(&self, worker: usize, bit: u32, role: &str) -> Result<CaptureRing> {
        let entry = self.entry(worker).ok_or_else(|| {
            CaptureError::invalid(format!(
                "worker {} out of range (arena has {})",
                worker,
                self.worker_count()
            ))
        })?;
        let prev = entry.claims.fetch_or(bit, Ordering::AcqRel);
        if prev & bit != 0 {
            return Err(CaptureError::invalid(format!(
                "{} role of worker {} ring is already claimed",
                role, worker
            )));
        }
        debug!(worker, role, "ring role claimed");
        self.ring(worker)
            .ok_or_else(|| CaptureError::invalid(format!("worker {} has no ring", worker)))
    }

    pub(crate) fn claim_producer(&self, worker: usize) -> Result<CaptureRing> {
        self.claim(worker, CLAIM_PRODUCER, "producer")
    }

    pub(crate) fn claim_consumer(&self, worker: usize) -> Result<CaptureRing> {
        self.claim(worker, CLAIM_CONSUMER, "consumer")
    }

    pub(crate) fn release(&self, worker: usize, bit: u32) {
        if let Some(entry) = self.entry(worker) {
            entry.claims.fetch_and(!bit, Ordering::AcqRel);
        }
    }
}

// The header pointer is only dereferenced for atomics and fields that are
// immutable after init.
unsafe impl Send for RingArena {}
unsafe impl Sync for RingArena {}

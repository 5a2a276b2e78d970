use super::{FrameIngestor, RingReader};
use crate::Capture::Structs::SLOT_SIZE;
use crate::Core::alloc::{RingArena, RingGeometry};
use crate::error::{CaptureError, Result};
use std::sync::Arc;
use tracing::info;

/// Ring capacity is `1 << DEFAULT_RING_ORDER` bytes per worker.
pub const DEFAULT_RING_ORDER: u32 = 19;

/// Slack per ring, in slots.
pub const DEFAULT_BURST_FACTOR: usize = 8;

pub const MIN_RING_ORDER: u32 = 7;
pub const MAX_RING_ORDER: u32 = 30;

/// Builds the per-worker rings and the handles for both roles.
pub struct CaptureBuilder {
    ring_order: u32,
    burst_factor: usize,
    workers: usize,
    shared_name: Option<String>,
}

impl Default for CaptureBuilder {
    fn default() -> Self {
        Self {
            ring_order: DEFAULT_RING_ORDER,
            burst_factor: DEFAULT_BURST_FACTOR,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            shared_name: None,
        }
    }
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ring_order(mut self, order: u32) -> Self {
        self.ring_order = order;
        self
    }

    pub fn with_burst_factor(mut self, burst_factor: usize) -> Self {
        self.burst_factor = burst_factor;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Back the rings with /dev/shm/`name` instead of the heap.
    pub fn with_shared_memory(mut self, name: impl Into<String>) -> Self {
        self.shared_name = Some(name.into());
        self
    }

    pub fn geometry(&self) -> Result<RingGeometry> {
        if !(MIN_RING_ORDER..=MAX_RING_ORDER).contains(&self.ring_order) {
            return Err(CaptureError::invalid(format!(
                "ring order {} must be in {}..={}",
                self.ring_order, MIN_RING_ORDER, MAX_RING_ORDER
            )));
        }
        if self.burst_factor == 0 {
            return Err(CaptureError::invalid("burst factor must be at least 1"));
        }
        RingGeometry::new(1usize << self.ring_order, SLOT_SIZE * self.burst_factor)
    }

    /// Allocate the arena only; roles are claimed later, possibly by
    /// different components.
    pub fn build_arena(&self) -> Result<Arc<RingArena>> {
        let geometry = self.geometry()?;
        let arena = match &self.shared_name {
            Some(name) => RingArena::create_shared(name, self.workers, geometry)?,
            None => RingArena::new_heap(self.workers, geometry)?,
        };
        info!(
            workers = self.workers,
            ring_bytes = geometry.capacity,
            slack_bytes = geometry.slack,
            shared = self.shared_name.is_some(),
            "capture rings allocated"
        );
        Ok(Arc::new(arena))
    }

    /// Allocate the arena and claim both roles of every ring.
    pub fn build(self) -> Result<CaptureSet> {
        let arena = self.build_arena()?;
        let ingestors = (0..self.workers)
            .map(|w| FrameIngestor::attach(Arc::clone(&arena), w))
            .collect::<Result<Vec<_>>>()?;
        let readers = (0..self.workers)
            .map(|w| RingReader::attach(Arc::clone(&arena), w))
            .collect::<Result<Vec<_>>>()?;
        Ok(CaptureSet {
            arena,
            ingestors,
            readers,
        })
    }
}

/// An arena with one ingestor and one reader per worker.
pub struct CaptureSet {
    pub arena: Arc<RingArena>,
    pub ingestors: Vec<FrameIngestor>,
    pub readers: Vec<RingReader>,
}

impl CaptureSet {
    pub fn into_parts(self) -> (Arc<RingArena>, Vec<FrameIngestor>, Vec<RingReader>) {
        (self.arena, self.ingestors, self.readers)
    }
}

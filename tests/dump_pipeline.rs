// End-to-end: frame source -> ingestors -> rings -> drain loop -> pcapng.
// Run with: cargo test --test dump_pipeline -- --nocapture

use mgcap::Capture::source::{FrameSource, MemorySource};
use mgcap::Capture::CaptureBuilder;
use mgcap::Trace::captured_frames;
use mgcap::dump::DumpSession;
use mgcap::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_memory_source_to_trace() {
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(16)
        .build()
        .unwrap();
    let (_arena, mut ingestors, readers) = set.into_parts();

    let mut source: MemorySource = (0..100u64)
        .map(|i| (vec![i as u8; 40 + i as usize * 10], i * 1_000))
        .collect();
    source.push(Vec::new(), 0);

    let stop = AtomicBool::new(false);
    let delivered = source.run(&mut ingestors[0], &stop).unwrap();
    assert_eq!(delivered, 101);
    assert_eq!(source.rejected(), 1);

    let mut session = DumpSession::new(readers, Vec::new());
    session.start().unwrap();
    assert_eq!(session.drain_all().unwrap(), 100);
    assert_eq!(session.drain_once().unwrap(), 0);
    assert_eq!(session.packets(), 100);

    let (_readers, encoder) = session.into_parts();
    let out = encoder.into_inner();
    let frames = captured_frames(&out).unwrap();
    assert_eq!(frames.len(), 100);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.timestamp, i as u64 * 1_000);
        assert_eq!(f.original_len, 40 + i as u32 * 10);
        assert!(f.data.iter().all(|&b| b == i as u8));
    }
}

#[test]
fn test_oversized_frame_does_not_end_the_capture() {
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, mut ingestors, readers) = set.into_parts();

    let mut source = MemorySource::new();
    source.push(vec![1u8; 64], 1);
    source.push(vec![2u8; 16_000], 2);
    source.push(vec![3u8; 64], 3);
    let stop = AtomicBool::new(false);
    assert_eq!(source.run(&mut ingestors[0], &stop).unwrap(), 3);
    assert_eq!(source.rejected(), 1);

    let mut session = DumpSession::new(readers, Vec::new());
    assert_eq!(session.drain_all().unwrap(), 2);

    let out = session.into_parts().1.into_inner();
    let ts: Vec<u64> = captured_frames(&out)
        .unwrap()
        .iter()
        .map(|f| f.timestamp)
        .collect();
    assert_eq!(ts, vec![1, 3]);
}

#[test]
fn test_empty_session_writes_only_headers() {
    let set = CaptureBuilder::new()
        .with_workers(2)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, _ingestors, readers) = set.into_parts();

    let stop = AtomicBool::new(true);
    let mut session = DumpSession::new(readers, Vec::new());
    assert_eq!(session.run(&stop).unwrap(), 0);

    let (_readers, encoder) = session.into_parts();
    let out = encoder.into_inner();
    assert_eq!(out.len(), 28 + 40);
    assert!(captured_frames(&out).unwrap().is_empty());
}

#[test]
fn test_zero_batch_is_rejected() {
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, _ingestors, readers) = set.into_parts();
    let err = DumpSession::new(readers, Vec::new())
        .with_batch_slots(0)
        .err()
        .unwrap();
    assert!(matches!(err, CaptureError::InvalidArgument(_)));
}

#[test]
fn test_concurrent_workers_and_drain_loop() {
    const PER_WORKER: u64 = 2_000;
    let workers = 3;

    let set = CaptureBuilder::new()
        .with_workers(workers)
        .with_ring_order(18)
        .build()
        .unwrap();
    let (arena, ingestors, readers) = set.into_parts();
    let stop = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = ingestors
        .into_iter()
        .map(|mut ingestor| {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let w = ingestor.worker() as u64;
                // Timestamps encode worker and sequence.
                let mut source: MemorySource = (0..PER_WORKER)
                    .map(|i| (vec![w as u8; 64], (w << 32) | i))
                    .collect();
                source.run(&mut ingestor, &stop).unwrap();
                (ingestor.accepted(), ingestor.dropped())
            })
        })
        .collect();

    let drain_stop = Arc::clone(&stop);
    let drainer = thread::spawn(move || {
        let mut session = DumpSession::new(readers, Vec::new())
            .with_poll_interval(Duration::from_micros(50))
            .with_batch_slots(64)
            .unwrap();
        let packets = session.run(&drain_stop).unwrap();
        (packets, session.into_parts().1.into_inner())
    });

    let mut accepted = 0;
    for p in producers {
        let (a, d) = p.join().unwrap();
        assert_eq!(d, 0);
        accepted += a;
    }
    stop.store(true, Ordering::SeqCst);
    let (packets, out) = drainer.join().unwrap();

    assert_eq!(accepted, workers as u64 * PER_WORKER);
    assert_eq!(packets, accepted);
    assert_eq!(arena.dropped_total(), 0);

    // Per-ring FIFO holds even though rings interleave in the output.
    let frames = captured_frames(&out).unwrap();
    let mut next = vec![0u64; workers];
    for f in &frames {
        let w = (f.timestamp >> 32) as usize;
        let seq = f.timestamp & 0xFFFF_FFFF;
        assert_eq!(seq, next[w]);
        assert!(f.data.iter().all(|&b| b == w as u8));
        next[w] += 1;
    }
    assert!(next.iter().all(|&n| n == PER_WORKER));
}

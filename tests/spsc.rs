// Producer/consumer handles over real threads.
// Run with: cargo test --test spsc -- --nocapture

use mgcap::Capture::Structs::{
    SlotHeader, MAX_FRAME_LEN, MIN_FRAME_LEN, SLOT_HEADER_SIZE, SLOT_PAYLOAD_CAPACITY, SLOT_SIZE,
};
use mgcap::Capture::{CaptureBuilder, FrameHandler, FrameIngestor, RingReader, Verdict};
use mgcap::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn frame_for(seq: u64, len: usize) -> Vec<u8> {
    let mut frame = vec![(seq & 0xFF) as u8; len];
    frame[..8].copy_from_slice(&seq.to_le_bytes());
    frame
}

#[test]
fn test_roles_are_exclusive() {
    let arena = CaptureBuilder::new()
        .with_workers(2)
        .with_ring_order(12)
        .build_arena()
        .unwrap();

    let ingestor = FrameIngestor::attach(Arc::clone(&arena), 0).unwrap();
    let err = FrameIngestor::attach(Arc::clone(&arena), 0).err().unwrap();
    assert!(matches!(err, CaptureError::InvalidArgument(_)));

    // The other role and the other worker are still free.
    let reader = RingReader::attach(Arc::clone(&arena), 0).unwrap();
    let _other = FrameIngestor::attach(Arc::clone(&arena), 1).unwrap();
    assert!(RingReader::attach(Arc::clone(&arena), 0).is_err());

    // Out of range.
    assert!(FrameIngestor::attach(Arc::clone(&arena), 2).is_err());

    // Dropping a handle releases its role.
    drop(ingestor);
    drop(reader);
    let _again = FrameIngestor::attach(Arc::clone(&arena), 0).unwrap();
    let _again_reader = RingReader::attach(arena, 0).unwrap();
}

#[test]
fn test_on_frame_verdicts() {
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, mut ingestors, mut readers) = set.into_parts();
    let ingestor = &mut ingestors[0];

    assert_eq!(ingestor.on_frame(&[], 1), Verdict::Rejected);
    assert_eq!(ingestor.on_frame(&vec![0u8; 65_536], 1), Verdict::Rejected);
    assert_eq!(ingestor.on_frame(&[1u8; 60], 1), Verdict::Accepted);
    assert_eq!(ingestor.on_frame(&vec![2u8; 9000], 2), Verdict::Accepted);
    assert_eq!(ingestor.accepted(), 2);

    let mut buf = vec![0u8; 4 * SLOT_SIZE];
    let n = readers[0].read_into(&mut buf).unwrap();
    assert_eq!(n, 2 * SLOT_SIZE);

    let jumbo = SlotHeader::read_from(&buf[SLOT_SIZE..]).unwrap();
    assert_eq!(jumbo.original_length, 9000);
    assert_eq!(jumbo.capture_timestamp, 2);
    assert!(buf[SLOT_SIZE + SLOT_HEADER_SIZE..2 * SLOT_SIZE]
        .iter()
        .all(|&b| b == 2));
}

#[test]
fn test_frame_length_bounds() {
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, mut ingestors, mut readers) = set.into_parts();
    let ingestor = &mut ingestors[0];

    let min = MIN_FRAME_LEN as usize;
    let max = MAX_FRAME_LEN as usize;
    assert_eq!(ingestor.on_frame(&[0u8; 1], 0), Verdict::Rejected);
    assert_eq!(ingestor.on_frame(&vec![0u8; min - 1], 1), Verdict::Rejected);
    assert_eq!(ingestor.on_frame(&vec![0u8; min], 2), Verdict::Accepted);
    assert_eq!(ingestor.on_frame(&vec![0u8; max], 3), Verdict::Accepted);
    assert_eq!(ingestor.on_frame(&vec![0u8; max + 1], 4), Verdict::Rejected);
    assert_eq!(ingestor.on_frame(&vec![0u8; 16_000], 5), Verdict::Rejected);
    assert_eq!(ingestor.accepted(), 2);
    assert_eq!(ingestor.dropped(), 0);

    // Only the in-range frames reached the ring.
    let mut buf = vec![0u8; 8 * SLOT_SIZE];
    let n = readers[0].read_into(&mut buf).unwrap();
    assert_eq!(n, 2 * SLOT_SIZE);
    let lengths: Vec<u16> = buf[..n]
        .chunks_exact(SLOT_SIZE)
        .map(|r| SlotHeader::read_from(r).unwrap().original_length)
        .collect();
    assert_eq!(lengths, vec![MIN_FRAME_LEN, MAX_FRAME_LEN]);
}

#[test]
fn test_full_ring_counts_drop_and_still_accepts() {
    // 1 << 9 = 512 bytes = 4 slots.
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(9)
        .build()
        .unwrap();
    let (arena, mut ingestors, mut readers) = set.into_parts();
    let before = mgcap::Capture::dropped_frames_total();

    for i in 0..5u64 {
        assert_eq!(ingestors[0].on_frame(&frame_for(i, 64), i), Verdict::Accepted);
    }
    assert_eq!(ingestors[0].accepted(), 4);
    assert_eq!(ingestors[0].dropped(), 1);
    assert_eq!(arena.dropped_total(), 1);
    assert!(mgcap::Capture::dropped_frames_total() >= before + 1);

    let mut buf = vec![0u8; 8 * SLOT_SIZE];
    assert_eq!(readers[0].read_into(&mut buf).unwrap(), 4 * SLOT_SIZE);
    let timestamps: Vec<u64> = buf[..4 * SLOT_SIZE]
        .chunks_exact(SLOT_SIZE)
        .map(|r| SlotHeader::read_from(r).unwrap().capture_timestamp)
        .collect();
    assert_eq!(timestamps, vec![0, 1, 2, 3]);
}

#[test]
fn test_reader_rejects_partial_slot_buffers() {
    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, mut ingestors, mut readers) = set.into_parts();
    ingestors[0].on_frame(&[0u8; 64], 0);

    for len in [0, 1, SLOT_SIZE - 1, SLOT_SIZE + 1] {
        let mut buf = vec![0u8; len];
        let err = readers[0].read_into(&mut buf).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidArgument(_)), "len {len}");
    }
    // Nothing was consumed by the failed reads.
    assert_eq!(readers[0].available(), SLOT_SIZE);

    readers[0].advance(SLOT_SIZE).unwrap();
    assert!(readers[0].is_empty());
    assert!(readers[0].advance(1).is_err());
}

#[test]
fn test_threaded_producer_consumer_keeps_order() {
    const FRAMES: u64 = 50_000;

    let set = CaptureBuilder::new()
        .with_workers(1)
        .with_ring_order(14)
        .build()
        .unwrap();
    let (arena, mut ingestors, mut readers) = set.into_parts();
    let mut ingestor = ingestors.pop().unwrap();
    let mut reader = readers.pop().unwrap();
    let done = Arc::new(AtomicBool::new(false));
    let producer_done = Arc::clone(&done);

    let producer = thread::spawn(move || {
        let mut rng = fastrand::Rng::with_seed(42);
        for seq in 0..FRAMES {
            let len = rng.usize(40..=1514);
            let frame = frame_for(seq, len);
            assert_eq!(ingestor.on_frame(&frame, seq), Verdict::Accepted);
        }
        producer_done.store(true, Ordering::Release);
        (ingestor.accepted(), ingestor.dropped())
    });

    let consumer = thread::spawn(move || {
        let mut buf = vec![0u8; 64 * SLOT_SIZE];
        let mut seen = Vec::new();
        loop {
            // Check before reading so the last records are never missed.
            let finished = done.load(Ordering::Acquire);
            let n = reader.read_into(&mut buf).unwrap();
            assert_eq!(n % SLOT_SIZE, 0);
            if n == 0 {
                if finished {
                    break;
                }
                thread::yield_now();
                continue;
            }
            for rec in buf[..n].chunks_exact(SLOT_SIZE) {
                let header = SlotHeader::read_from(rec).unwrap();
                let mut seq = [0u8; 8];
                seq.copy_from_slice(&rec[SLOT_HEADER_SIZE..SLOT_HEADER_SIZE + 8]);
                let seq = u64::from_le_bytes(seq);
                // The timestamp and the payload came from the same frame.
                assert_eq!(header.capture_timestamp, seq);
                assert!((40..=1514).contains(&header.original_length));
                let kept = (header.original_length as usize).min(SLOT_PAYLOAD_CAPACITY);
                assert!(rec[SLOT_HEADER_SIZE + 8..SLOT_HEADER_SIZE + kept]
                    .iter()
                    .all(|&b| b == (seq & 0xFF) as u8));
                seen.push(seq);
            }
        }
        seen
    });

    let (accepted, dropped) = producer.join().unwrap();
    let seen = consumer.join().unwrap();

    println!("accepted: {accepted}, dropped: {dropped}, seen: {}", seen.len());
    assert_eq!(accepted + dropped, FRAMES);
    assert_eq!(seen.len() as u64, accepted);
    assert_eq!(arena.dropped_total(), dropped);
    // Strictly increasing: drops may leave gaps but never reorder.
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_workers_are_independent() {
    let set = CaptureBuilder::new()
        .with_workers(4)
        .with_ring_order(12)
        .build()
        .unwrap();
    let (_arena, ingestors, readers) = set.into_parts();

    let handles: Vec<_> = ingestors
        .into_iter()
        .map(|mut ingestor| {
            thread::spawn(move || {
                let w = ingestor.worker() as u64;
                for i in 0..10u64 {
                    ingestor.on_frame(&frame_for(w * 100 + i, 64), w);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for mut reader in readers {
        let mut buf = vec![0u8; 16 * SLOT_SIZE];
        let n = reader.read_into(&mut buf).unwrap();
        assert_eq!(n, 10 * SLOT_SIZE);
        for rec in buf[..n].chunks_exact(SLOT_SIZE) {
            let header = SlotHeader::read_from(rec).unwrap();
            assert_eq!(header.capture_timestamp, reader.worker() as u64);
        }
    }
}

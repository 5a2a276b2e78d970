use crate::Capture::source::FrameSource;
use crate::Capture::{CaptureBuilder, FrameIngestor, DEFAULT_RING_ORDER};
use crate::dump::DumpSession;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mgdump")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Capture frames from an interface into a pcapng file", long_about = None)]
pub struct Cli {
    #[arg(help = "Network interface to capture on")]
    pub ifname: String,

    #[arg(short, long, default_value = "output.pcap", help = "Output file path")]
    pub output: PathBuf,

    #[arg(short, long, default_value_t = 1, help = "Capture workers (one ring each)")]
    pub workers: usize,

    #[arg(long, default_value_t = DEFAULT_RING_ORDER, help = "Ring size per worker as a power of two")]
    pub ring_order: u32,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

/// Open every source for `cli.ifname`, one per worker.
#[cfg(target_os = "linux")]
fn open_sources(cli: &Cli) -> crate::Result<Vec<Box<dyn FrameSource + Send>>> {
    use crate::Capture::source::RawSocketSource;

    let fanout = (cli.workers > 1).then(|| (std::process::id() & 0xFFFF) as u16);
    (0..cli.workers)
        .map(|_| {
            RawSocketSource::bind(&cli.ifname, fanout)
                .map(|s| Box::new(s) as Box<dyn FrameSource + Send>)
        })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn open_sources(cli: &Cli) -> crate::Result<Vec<Box<dyn FrameSource + Send>>> {
    Err(crate::CaptureError::unavailable(
        format!("capture interface {:?}", cli.ifname),
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "raw capture is only supported on Linux",
        ),
    ))
}

fn spawn_worker(
    mut source: Box<dyn FrameSource + Send>,
    mut ingestor: FrameIngestor,
    stop: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<crate::Result<FrameIngestor>>> {
    let name = format!("mgcap-rx{}", ingestor.worker());
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            let delivered = source.run(&mut ingestor, &stop)?;
            info!(
                worker = ingestor.worker(),
                delivered,
                dropped = ingestor.dropped(),
                "capture worker finished"
            );
            Ok(ingestor)
        })
        .context("cannot spawn capture worker")
}

/// Capture until interrupted. Returns the number of packets written.
pub fn run(cli: &Cli) -> Result<u64> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("cannot set interrupt handler")?;

    let sources = open_sources(cli).context("cannot open mgcap device")?;

    let set = CaptureBuilder::new()
        .with_workers(cli.workers)
        .with_ring_order(cli.ring_order)
        .build()?;
    let (arena, ingestors, readers) = set.into_parts();

    let file = File::create(&cli.output)
        .with_context(|| format!("cannot open output file {}", cli.output.display()))?;

    println!("mgdump: listening on {}", cli.ifname);

    let workers = sources
        .into_iter()
        .zip(ingestors)
        .map(|(source, ingestor)| spawn_worker(source, ingestor, Arc::clone(&stop)))
        .collect::<Result<Vec<_>>>()?;

    let mut session = DumpSession::new(readers, BufWriter::new(file));
    let result = session.run(&stop);

    // Make sure the workers exit even if the drain loop failed.
    stop.store(true, Ordering::SeqCst);
    for handle in workers {
        match handle.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "capture worker failed"),
            Err(_) => warn!("capture worker panicked"),
        }
    }

    let packets = result?;
    let dropped = arena.dropped_total();
    if dropped > 0 {
        warn!(dropped, "frames dropped on full rings");
    }
    Ok(packets)
}

/// Validate options clap cannot express.
pub fn check(cli: &Cli) -> Result<()> {
    if cli.workers == 0 {
        return Err(anyhow!("--workers must be at least 1"));
    }
    Ok(())
}

//! Frame sources feeding a [`FrameHandler`].
//!
//! The capture core never depends on how frames are obtained; a source only
//! has to call `on_frame` once per frame from a single thread per worker.

use super::{FrameHandler, Verdict};
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Something that delivers frames until told to stop.
pub trait FrameSource {
    /// Deliver frames to `handler` until `stop` is set or the source is
    /// exhausted. Returns the number of frames delivered.
    fn run(&mut self, handler: &mut dyn FrameHandler, stop: &AtomicBool) -> Result<u64>;
}

/// Nanoseconds since the Unix epoch, the resolution declared in the trace.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Replays frames held in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    frames: Vec<(Vec<u8>, u64)>,
    rejected: u64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: impl Into<Vec<u8>>, timestamp_ns: u64) {
        self.frames.push((frame.into(), timestamp_ns));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames the handler refused during the last run.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl FromIterator<(Vec<u8>, u64)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, u64)>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
            rejected: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn run(&mut self, handler: &mut dyn FrameHandler, stop: &AtomicBool) -> Result<u64> {
        self.rejected = 0;
        let mut delivered = 0;
        for (frame, ts) in &self.frames {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if handler.on_frame(frame, *ts) == Verdict::Rejected {
                self.rejected += 1;
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

#[cfg(target_os = "linux")]
pub use raw_socket::RawSocketSource;

#[cfg(target_os = "linux")]
mod raw_socket {
    use super::{now_ns, FrameSource};
    use crate::Capture::FrameHandler;
    use crate::error::{CaptureError, Result};
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tracing::{debug, info, warn};

    // From <linux/if_packet.h>.
    const PACKET_FANOUT: libc::c_int = 18;
    const PACKET_FANOUT_CPU: u32 = 2;

    /// Receive buffer; large enough for any frame the encoder accepts.
    const RECV_BUF_SIZE: usize = 1 << 16;

    /// AF_PACKET raw socket bound to one interface.
    ///
    /// Sockets sharing a fanout group split traffic by receiving CPU, which
    /// gives one source per worker ring.
    pub struct RawSocketSource {
        fd: OwnedFd,
        ifname: String,
        buf: Vec<u8>,
    }

    impl RawSocketSource {
        /// Open and bind a raw socket to `ifname`.
        pub fn bind(ifname: &str, fanout_group: Option<u16>) -> Result<Self> {
            let what = || format!("capture interface {:?}", ifname);

            let raw = unsafe {
                libc::socket(
                    libc::AF_PACKET,
                    libc::SOCK_RAW,
                    (libc::ETH_P_ALL as u16).to_be() as i32,
                )
            };
            if raw < 0 {
                return Err(CaptureError::unavailable(what(), io::Error::last_os_error()));
            }
            // Safety: `raw` is a fresh descriptor we own.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };

            let ifindex = ifindex(fd.as_raw_fd(), ifname).map_err(|e| CaptureError::unavailable(what(), e))?;

            let sockaddr = libc::sockaddr_ll {
                sll_family: libc::AF_PACKET as u16,
                sll_protocol: (libc::ETH_P_ALL as u16).to_be(),
                sll_ifindex: ifindex,
                sll_hatype: 0,
                sll_pkttype: 0,
                sll_halen: 0,
                sll_addr: [0; 8],
            };
            let ret = unsafe {
                libc::bind(
                    fd.as_raw_fd(),
                    &sockaddr as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                )
            };
            if ret < 0 {
                return Err(CaptureError::unavailable(what(), io::Error::last_os_error()));
            }

            // Wake up periodically so the stop flag is honored.
            let timeout = libc::timeval {
                tv_sec: 0,
                tv_usec: 100_000,
            };
            setsockopt(fd.as_raw_fd(), libc::SOL_SOCKET, libc::SO_RCVTIMEO, &timeout)
                .map_err(|e| CaptureError::unavailable(what(), e))?;

            let mreq = libc::packet_mreq {
                mr_ifindex: ifindex,
                mr_type: libc::PACKET_MR_PROMISC as u16,
                mr_alen: 0,
                mr_address: [0; 8],
            };
            if let Err(e) = setsockopt(fd.as_raw_fd(), libc::SOL_PACKET, libc::PACKET_ADD_MEMBERSHIP, &mreq) {
                warn!(ifname, error = %e, "failed to enable promiscuous mode");
            }

            if let Some(group) = fanout_group {
                let arg: u32 = u32::from(group) | (PACKET_FANOUT_CPU << 16);
                setsockopt(fd.as_raw_fd(), libc::SOL_PACKET, PACKET_FANOUT, &arg)
                    .map_err(|e| CaptureError::unavailable(what(), e))?;
                debug!(ifname, group, "joined packet fanout group");
            }

            info!(ifname, ifindex, "raw socket bound");
            Ok(Self {
                fd,
                ifname: ifname.to_string(),
                buf: vec![0u8; RECV_BUF_SIZE],
            })
        }

        pub fn ifname(&self) -> &str {
            &self.ifname
        }
    }

    impl FrameSource for RawSocketSource {
        fn run(&mut self, handler: &mut dyn FrameHandler, stop: &AtomicBool) -> Result<u64> {
            let mut delivered = 0;
            while !stop.load(Ordering::Relaxed) {
                let n = unsafe {
                    libc::recv(
                        self.fd.as_raw_fd(),
                        self.buf.as_mut_ptr() as *mut libc::c_void,
                        self.buf.len(),
                        0,
                    )
                };
                if n < 0 {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => continue,
                        _ => return Err(CaptureError::Io(err)),
                    }
                }
                let ts = now_ns();
                handler.on_frame(&self.buf[..n as usize], ts);
                delivered += 1;
            }
            Ok(delivered)
        }
    }

    fn ifindex(fd: RawFd, ifname: &str) -> io::Result<i32> {
        let name = CString::new(ifname)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;
        let bytes = name.as_bytes_with_nul();

        let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
        if bytes.len() > ifr.ifr_name.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "interface name too long",
            ));
        }
        for (dst, src) in ifr.ifr_name.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }

        if unsafe { libc::ioctl(fd, libc::SIOCGIFINDEX as _, &mut ifr) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe { ifr.ifr_ifru.ifru_ifindex })
    }

    fn setsockopt<T>(fd: RawFd, level: libc::c_int, name: libc::c_int, value: &T) -> io::Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                fd,
                level,
                name,
                value as *const T as *const libc::c_void,
                std::mem::size_of::<T>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

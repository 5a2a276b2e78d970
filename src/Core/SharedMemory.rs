// Backing memory for ring arenas.
// Heap regions serve in-process capture; /dev/shm regions let a consumer in
// another process attach to the same rings.

use std::alloc::{self, Layout};
use std::fmt::Debug;
use std::io;
use std::ptr::NonNull;

/// Alignment of every region. Matches the arena header alignment.
pub const REGION_ALIGN: usize = 128;

/// Memory backend trait for ring arenas
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the start of the region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the region in bytes
    fn size(&self) -> usize;

    /// Get the underlying handle
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Process-private heap allocation
    Heap,
    /// Unix file descriptor (Linux)
    Fd(i32),
}

/// Zeroed, 128-byte aligned heap region.
#[derive(Debug)]
pub struct HeapMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

unsafe impl Send for HeapMemory {}
unsafe impl Sync for HeapMemory {}

impl HeapMemory {
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region size must be non-zero",
            ));
        }
        let layout = Layout::from_size_align(size, REGION_ALIGN)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // Safety: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("failed to allocate {} byte ring region", size),
            )
        })?;
        Ok(Self { ptr, layout })
    }
}

impl Drop for HeapMemory {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl SharedMemoryBackend for HeapMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.layout.size()
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Heap
    }
}

/// Allocate a process-private region.
pub fn create_heap_memory(size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(HeapMemory::new(size)?))
}

/// Create a new named shared memory region under /dev/shm.
///
/// The region is zero-filled and removed from /dev/shm when the returned
/// backend is dropped.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(size: usize, name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

/// Attach to an existing named region created by [`create_shared_memory`].
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::attach(name)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_size: usize, _name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(_name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
pub use linux::LinuxSharedMemory;

#[cfg(target_os = "linux")]
mod linux {
    use super::{RawHandle, SharedMemoryBackend};
    use std::fs::{self, File, OpenOptions};
    use std::io;
    use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::PathBuf;
    use std::ptr::{self, NonNull};

    #[derive(Debug)]
    pub struct LinuxSharedMemory {
        ptr: NonNull<u8>,
        size: usize,
        fd: RawFd,
        /// Set for the creator, which unlinks the file on drop.
        path: Option<PathBuf>,
    }

    unsafe impl Send for LinuxSharedMemory {}
    unsafe impl Sync for LinuxSharedMemory {}

    fn shm_path(name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name.contains('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid shared memory name {:?}", name),
            ));
        }
        Ok(PathBuf::from(format!("/dev/shm/{}", name)))
    }

    fn map(file: File, size: usize) -> io::Result<(NonNull<u8>, RawFd)> {
        let fd = file.into_raw_fd();
        // mmap returns page-aligned addresses, which satisfies REGION_ALIGN.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        match NonNull::new(raw as *mut u8) {
            Some(ptr) => Ok((ptr, fd)),
            None => {
                unsafe { libc::close(fd) };
                Err(io::Error::new(io::ErrorKind::Other, "mmap returned null"))
            }
        }
    }

    impl LinuxSharedMemory {
        pub fn create(size: usize, name: &str) -> io::Result<Self> {
            let path = shm_path(name)?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to create shared memory file at {}: {}", path.display(), e),
                    )
                })?;

            // A fresh ftruncate'd file reads back as zeroes.
            if unsafe { libc::ftruncate(file.as_raw_fd(), size as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                let _ = fs::remove_file(&path);
                return Err(err);
            }

            let (ptr, fd) = map(file, size).inspect_err(|_| {
                let _ = fs::remove_file(&path);
            })?;

            Ok(Self {
                ptr,
                size,
                fd,
                path: Some(path),
            })
        }

        pub fn attach(name: &str) -> io::Result<Self> {
            let path = shm_path(name)?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("Failed to open shared memory at {}: {}", path.display(), e),
                    )
                })?;

            let size = file.metadata()?.len() as usize;
            if size == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("shared memory at {} is empty", path.display()),
                ));
            }

            let (ptr, fd) = map(file, size)?;
            Ok(Self {
                ptr,
                size,
                fd,
                path: None,
            })
        }
    }

    impl Drop for LinuxSharedMemory {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
                libc::close(self.fd);
            }
            if let Some(path) = self.path.take() {
                let _ = fs::remove_file(path);
            }
        }
    }

    impl SharedMemoryBackend for LinuxSharedMemory {
        fn as_ptr(&self) -> *mut u8 {
            self.ptr.as_ptr()
        }

        fn size(&self) -> usize {
            self.size
        }

        fn raw_handle(&self) -> RawHandle {
            RawHandle::Fd(self.fd)
        }
    }
}

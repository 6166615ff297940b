// Shared memory backend abstraction for Linux.
// Regions are files under /dev/shm, sized with ftruncate and mapped MAP_SHARED.

use std::fmt::Debug;
use std::io;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::fd::{AsRawFd, IntoRawFd};
#[cfg(target_os = "linux")]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(target_os = "linux")]
use std::ptr::{self, NonNull};

/// Shared memory backend trait for cross-platform memory mapping.
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region.
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes.
    fn size(&self) -> usize;

    /// Get the underlying file descriptor.
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type.
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux).
    Fd(i32),
}

/// Create a new named shared memory region of exactly `size` bytes.
///
/// Fails with `AlreadyExists` if another process already created the name.
/// The returned handle owns the name: dropping it unlinks the region from
/// the namespace in addition to unmapping. Callers must ensure no peer is
/// still attaching when the creator drops.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(PosixSharedMemory::create(name, size)?))
}

/// Attach to an existing shared memory region.
///
/// The region must have exactly `expected_size` bytes; a mismatched size
/// means the two sides disagree on capacity and is rejected.
#[cfg(target_os = "linux")]
pub fn open_shared_memory(
    name: &str,
    expected_size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(PosixSharedMemory::open(name, expected_size)?))
}

/// Create the region, or attach to it if some other process won the race.
///
/// Returns the mapping and whether this call created it. Exactly one caller
/// observes `true`; that caller's drop unlinks the name.
#[cfg(target_os = "linux")]
pub fn create_or_open_shared_memory(
    name: &str,
    size: usize,
) -> io::Result<(Box<dyn SharedMemoryBackend>, bool)> {
    match PosixSharedMemory::create(name, size) {
        Ok(shm) => Ok((Box::new(shm), true)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Ok((Box::new(PosixSharedMemory::open(name, size)?), false))
        }
        Err(e) => Err(e),
    }
}

/// Remove a region name from the namespace without mapping it.
/// Useful for cleaning up after a crashed creator.
#[cfg(target_os = "linux")]
pub fn unlink_shared_memory(name: &str) -> io::Result<()> {
    std::fs::remove_file(shm_path(name))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
pub fn open_shared_memory(
    _name: &str,
    _expected_size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
pub fn create_or_open_shared_memory(
    _name: &str,
    _size: usize,
) -> io::Result<(Box<dyn SharedMemoryBackend>, bool)> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
pub fn unlink_shared_memory(_name: &str) -> io::Result<()> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    )
}

#[cfg(target_os = "linux")]
fn shm_path(name: &str) -> String {
    format!("/dev/shm/{}", name)
}

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct PosixSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    name: String,
    /// Set on the handle that created the name; drives unlink on drop.
    owner: bool,
}

#[cfg(target_os = "linux")]
unsafe impl Send for PosixSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for PosixSharedMemory {}

#[cfg(target_os = "linux")]
impl PosixSharedMemory {
    /// Create a new region under /dev/shm. Fails if the name already exists.
    ///
    /// The backing file is extended with ftruncate, so the mapping starts
    /// zero-filled.
    pub fn create(name: &str, size: usize) -> io::Result<Self> {
        let path = shm_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create shared memory file at {}: {}", path, e),
                )
            })?;

        if unsafe { libc::ftruncate(file.as_raw_fd(), size as i64) } != 0 {
            let err = io::Error::last_os_error();
            let _ = std::fs::remove_file(&path);
            return Err(err);
        }

        let fd = file.into_raw_fd();
        let ptr = match map_fd(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        };

        tracing::debug!(name, size, "created shared memory region");
        Ok(Self {
            ptr,
            size,
            fd,
            name: name.to_owned(),
            owner: true,
        })
    }

    /// Attach to an existing region, verifying its size matches exactly.
    pub fn open(name: &str, expected_size: usize) -> io::Result<Self> {
        let path = shm_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Failed to open shared memory at {}: {}", path, e),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size != expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory size mismatch: expected {} bytes, got {}",
                    expected_size, file_size
                ),
            ));
        }

        let fd = file.into_raw_fd();
        let ptr = match map_fd(fd, file_size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        tracing::debug!(name, size = file_size, "attached shared memory region");
        Ok(Self {
            ptr,
            size: file_size,
            fd,
            name: name.to_owned(),
            owner: false,
        })
    }
}

#[cfg(target_os = "linux")]
fn map_fd(fd: i32, size: usize) -> io::Result<NonNull<u8>> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    // mmap returns page-aligned memory, which satisfies every header field.
    NonNull::new(ptr as *mut u8)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))
}

#[cfg(target_os = "linux")]
impl Drop for PosixSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
        if self.owner {
            let _ = std::fs::remove_file(shm_path(&self.name));
            tracing::debug!(name = %self.name, "unlinked shared memory region");
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for PosixSharedMemory {
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

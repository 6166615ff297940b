use std::io;
use std::ptr;
use std::sync::atomic::AtomicU64;

use crossbeam_utils::CachePadded;

use crate::core::shared_memory::{
    create_or_open_shared_memory, create_shared_memory, open_shared_memory, SharedMemoryBackend,
};
use crate::core::sync::{sync_ops, SyncCell, SyncKind};
use crate::error::QueueError;
use crate::queue::layout::{header_size, QueueHeader, LAYOUT_VERSION, MIN_CAPACITY, QUEUE_MAGIC};
use crate::queue::ring::RingView;

/// A mapped queue region: the shared memory handle plus the ring view over
/// its header and byte array.
///
/// Dropping the region unmaps it; the handle that created the name also
/// unlinks it. Callers are responsible for only dropping the creator after
/// every peer has observed termination.
pub struct QueueRegion {
    // Keeps the mapping alive for the ring view below. Never read directly.
    _shm: Box<dyn SharedMemoryBackend>,
    ring: RingView,
}

impl QueueRegion {
    /// Create and initialize a fresh region: zeroed header, magic, version,
    /// capacity, and the sync primitives of `kind`.
    pub fn create(name: &str, total_size: usize, kind: SyncKind) -> Result<Self, QueueError> {
        validate_total_size(total_size)?;
        let shm = create_shared_memory(name, total_size).map_err(QueueError::Allocation)?;
        let region = Self::initialize(shm, kind)?;
        tracing::debug!(name, total_size, ?kind, "queue region created");
        Ok(region)
    }

    /// Attach to a region some other process created, validating the header
    /// before touching anything else.
    pub fn attach(name: &str, total_size: usize) -> Result<Self, QueueError> {
        validate_total_size(total_size)?;
        let shm = open_shared_memory(name, total_size).map_err(QueueError::Allocation)?;
        let region = Self::validate(shm)?;
        tracing::debug!(name, total_size, "queue region attached");
        Ok(region)
    }

    /// Create the region, or attach if another process won the race. The
    /// first caller initializes the header; everyone else validates it.
    pub fn create_or_open(
        name: &str,
        total_size: usize,
        kind: SyncKind,
    ) -> Result<Self, QueueError> {
        validate_total_size(total_size)?;
        let (shm, created) =
            create_or_open_shared_memory(name, total_size).map_err(QueueError::Allocation)?;
        let region = if created {
            let region = Self::initialize(shm, kind)?;
            tracing::debug!(name, total_size, ?kind, "queue region created");
            region
        } else {
            let region = Self::validate(shm)?;
            tracing::debug!(name, total_size, "queue region attached");
            region
        };
        Ok(region)
    }

    fn initialize(shm: Box<dyn SharedMemoryBackend>, kind: SyncKind) -> Result<Self, QueueError> {
        let header = checked_header_ptr(&*shm)?;
        let capacity = shm.size() - header_size();

        unsafe {
            ptr::write(
                header,
                QueueHeader {
                    magic: QUEUE_MAGIC,
                    version: LAYOUT_VERSION,
                    sync_kind: kind.as_raw(),
                    capacity: capacity as u64,
                    lock: SyncCell::zeroed(),
                    not_empty: SyncCell::zeroed(),
                    not_full: SyncCell::zeroed(),
                    head: CachePadded::new(AtomicU64::new(0)),
                    tail: CachePadded::new(AtomicU64::new(0)),
                },
            );
        }

        let ops = sync_ops(kind);
        unsafe {
            ops.init_lock(&(*header).lock)?;
            ops.init_cond(&(*header).not_empty)?;
            ops.init_cond(&(*header).not_full)?;
        }

        let data = unsafe { shm.as_ptr().add(header_size()) };
        let ring = unsafe { RingView::new(header, data, ops) };
        Ok(Self { _shm: shm, ring })
    }

    fn validate(shm: Box<dyn SharedMemoryBackend>) -> Result<Self, QueueError> {
        let header = checked_header_ptr(&*shm)?;

        let (magic, version, sync_kind, capacity) = unsafe {
            (
                (*header).magic,
                (*header).version,
                (*header).sync_kind,
                (*header).capacity as usize,
            )
        };

        if magic != QUEUE_MAGIC {
            return Err(invalid_region(format!(
                "bad magic {magic:#018x}; region was never initialized as a queue"
            )));
        }
        if version != LAYOUT_VERSION {
            return Err(invalid_region(format!(
                "layout version {version} does not match ours ({LAYOUT_VERSION})"
            )));
        }
        if capacity != shm.size() - header_size() {
            return Err(invalid_region(format!(
                "header capacity {} disagrees with mapped size {}",
                capacity,
                shm.size()
            )));
        }
        let kind = SyncKind::from_raw(sync_kind).ok_or_else(|| {
            QueueError::SyncInit(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown sync backend {sync_kind} recorded in header"),
            ))
        })?;

        let ops = sync_ops(kind);
        let data = unsafe { shm.as_ptr().add(header_size()) };
        let ring = unsafe { RingView::new(header, data, ops) };
        Ok(Self { _shm: shm, ring })
    }

    /// The ring view over this region.
    pub fn ring(&self) -> &RingView {
        &self.ring
    }
}

fn validate_total_size(total_size: usize) -> Result<(), QueueError> {
    if total_size < header_size() + MIN_CAPACITY {
        return Err(QueueError::Allocation(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "region of {} bytes cannot hold the {}-byte header plus a {}-byte ring",
                total_size,
                header_size(),
                MIN_CAPACITY
            ),
        )));
    }
    Ok(())
}

fn checked_header_ptr(shm: &dyn SharedMemoryBackend) -> Result<*mut QueueHeader, QueueError> {
    let header = shm.as_ptr() as *mut QueueHeader;
    if (header as usize) % std::mem::align_of::<QueueHeader>() != 0 {
        return Err(QueueError::Allocation(io::Error::new(
            io::ErrorKind::InvalidData,
            "shared memory mapping is not aligned for the queue header",
        )));
    }
    Ok(header)
}

fn invalid_region(message: String) -> QueueError {
    QueueError::Allocation(io::Error::new(io::ErrorKind::InvalidData, message))
}

use std::io;
use thiserror::Error;

/// Errors surfaced by queue construction and queue operations.
///
/// Allocation and sync-init failures are fatal to the caller of
/// create/attach and are never retried internally. Framing violations are
/// fatal to the queue instance: the process observing one must stop touching
/// the region rather than resynchronize blindly.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The shared region could not be created, sized, mapped, or attached.
    #[error("shared memory allocation failed: {0}")]
    Allocation(#[source] io::Error),

    /// Cross-process lock or condition objects could not be created or opened.
    #[error("sync primitive initialization failed: {0}")]
    SyncInit(#[source] io::Error),

    /// A lock, wait, or signal operation failed after initialization.
    #[error("sync primitive failure: {0}")]
    Sync(#[source] io::Error),

    /// A single frame can never fit in the ring, no matter how long we wait.
    #[error("frame of {framed} bytes cannot fit in a ring of {capacity} bytes")]
    CapacityExceeded { framed: usize, capacity: usize },

    /// A length prefix implied more bytes than the ring logically holds.
    /// Indicates producer/consumer desynchronization or corruption.
    #[error("framing violation: {0}")]
    FramingViolation(String),

    /// The producer already pushed the termination frame.
    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    #[cfg(not(target_os = "linux"))]
    pub(crate) fn unsupported(what: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{what} is only supported on Linux"),
        )
    }
}

// Cross-process framed byte queue over a shared-memory ring buffer.
//
// A producer process frames already-encoded payload bytes with a 4-byte
// length prefix and writes them into a circular byte array living in a
// named shared-memory region. A consumer process drains whole frames into
// a process-local queue on a dedicated reader thread, so the cross-process
// lock is held only for the duration of a memory copy.

pub mod core {
    pub mod futex;
    pub mod pthread;
    pub mod shared_memory;
    pub mod sync;
    pub use shared_memory::{
        create_or_open_shared_memory, create_shared_memory, open_shared_memory,
        unlink_shared_memory, RawHandle, SharedMemoryBackend,
    };
    pub use sync::{sync_ops, LockGuard, SyncCell, SyncKind, SyncOps};
}

pub mod queue {
    pub mod builder;
    pub mod consumer;
    pub mod layout;
    pub mod producer;
    pub mod region;
    pub mod ring;
    pub use builder::QueueBuilder;
    pub use consumer::Consumer;
    pub use producer::Producer;
    pub use region::QueueRegion;
    pub use ring::RingView;
}

pub mod error;

pub use error::QueueError;
pub use queue::{Consumer, Producer, QueueBuilder};

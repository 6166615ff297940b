use crate::core::sync::SyncKind;
use crate::error::QueueError;
use crate::queue::consumer::Consumer;
use crate::queue::producer::Producer;
use crate::queue::region::QueueRegion;

/// Region size used when the caller does not pick one.
pub const DEFAULT_REGION_SIZE: usize = 10 * 1024 * 1024; // 10 MB shared memory

/// Configuration surface for a queue endpoint.
///
/// Name, total region size, and sync backend must agree between producer
/// and consumer; they are the out-of-band contract between the two
/// processes. Whichever endpoint starts first creates and initializes the
/// region, the other attaches.
pub struct QueueBuilder {
    name: String,
    total_size: usize,
    sync: SyncKind,
}

impl QueueBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_size: DEFAULT_REGION_SIZE,
            sync: SyncKind::Futex,
        }
    }

    /// Total region size in bytes, header included.
    pub fn with_total_size(mut self, bytes: usize) -> Self {
        self.total_size = bytes;
        self
    }

    /// Sync backend for the region primitives. Only consulted by whichever
    /// endpoint ends up creating the region; attachers follow the header.
    pub fn with_sync(mut self, kind: SyncKind) -> Self {
        self.sync = kind;
        self
    }

    pub fn build_producer(self) -> Result<Producer, QueueError> {
        let region = QueueRegion::create_or_open(&self.name, self.total_size, self.sync)?;
        Ok(Producer::new(region))
    }

    pub fn build_consumer(self) -> Result<Consumer, QueueError> {
        let region = QueueRegion::create_or_open(&self.name, self.total_size, self.sync)?;
        Consumer::new(region)
    }
}

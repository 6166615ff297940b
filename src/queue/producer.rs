use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::QueueError;
use crate::queue::region::QueueRegion;

/// Writing end of a queue.
///
/// Payloads are opaque bytes; whatever encoder produced them runs outside
/// the queue. `push` blocks while the ring lacks space and only returns an
/// error for frames that could never fit or for sync failures. A producer
/// whose consumer never drains blocks indefinitely; callers needing a bound
/// must layer a timeout on top.
pub struct Producer {
    region: QueueRegion,
    closed: AtomicBool,
}

impl Producer {
    pub(crate) fn new(region: QueueRegion) -> Self {
        Self {
            region,
            closed: AtomicBool::new(false),
        }
    }

    /// Frame `payload` and write it into the ring, blocking while full.
    ///
    /// # Returns
    /// * `Ok(())` once the whole frame is in the ring
    /// * `Err(CapacityExceeded)` if the frame can never fit
    /// * `Err(Closed)` after `close` was called
    pub fn push<T: AsRef<[u8]>>(&self, payload: T) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        self.region.ring().push_frame(payload.as_ref())
    }

    /// Request shutdown: push the termination frame through the normal
    /// data path. The consumer observes it strictly after every frame
    /// pushed before this call.
    pub fn close(&self) -> Result<(), QueueError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(QueueError::Closed);
        }
        self.region.ring().push_close()
    }

    /// Largest payload a single `push` can carry.
    pub fn max_payload(&self) -> usize {
        self.region.ring().max_payload()
    }
}

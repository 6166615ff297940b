use std::ptr;
use std::sync::atomic::Ordering::Relaxed;

use crate::core::sync::{LockGuard, SyncOps};
use crate::error::QueueError;
use crate::queue::layout::QueueHeader;

/// Width of the length prefix in front of every payload.
pub const FRAME_PREFIX: usize = 4;

/// Reserved length prefix marking end-of-stream. This is the fixed-slot
/// queue's `-1` sentinel reinterpreted as the unsigned prefix; legitimate
/// lengths never come close, so both sides can tell it apart from data.
pub const CLOSE_FRAME: u32 = u32::MAX;

/// Byte-wraparound read/write engine over a mapped region.
///
/// This struct is NOT stored in shared memory. It is a transient view that
/// holds pointers to the header and the ring byte array behind it, plus the
/// sync backend recorded in the header.
///
/// All offset arithmetic lives in `write_bytes`/`read_bytes`; the framed
/// operations build on those two without re-deriving wraparound math.
pub struct RingView {
    header: *mut QueueHeader,
    data: *mut u8,
    capacity: usize,
    ops: &'static dyn SyncOps,
}

unsafe impl Send for RingView {}
unsafe impl Sync for RingView {}

impl RingView {
    /// Create a ring view over an initialized region.
    ///
    /// # Safety
    /// `header` must point to a validated `QueueHeader` and `data` to the
    /// `capacity` ring bytes behind it; both must stay mapped for the
    /// lifetime of the view.
    pub unsafe fn new(header: *mut QueueHeader, data: *mut u8, ops: &'static dyn SyncOps) -> Self {
        let capacity = (*header).capacity as usize;
        Self {
            header,
            data,
            capacity,
            ops,
        }
    }

    fn header(&self) -> &QueueHeader {
        unsafe { &*self.header }
    }

    /// Usable ring bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest payload a single frame can carry: the prefix and the one
    /// reserved ring byte come out of `capacity`.
    pub fn max_payload(&self) -> usize {
        self.capacity - FRAME_PREFIX - 1
    }

    // head/tail are plain offsets guarded by the region lock; the atomics
    // exist for defined cross-process access, not for lock-free protocol.
    fn head(&self) -> usize {
        self.header().head.load(Relaxed) as usize
    }

    fn tail(&self) -> usize {
        self.header().tail.load(Relaxed) as usize
    }

    fn set_head(&self, head: usize) {
        self.header().head.store(head as u64, Relaxed);
    }

    fn set_tail(&self, tail: usize) {
        self.header().tail.store(tail as u64, Relaxed);
    }

    /// Free bytes in the ring. Caller must hold the region lock.
    fn free_space(&self) -> usize {
        let head = self.head();
        let tail = self.tail();
        if tail >= head {
            self.capacity - (tail - head)
        } else {
            head - tail
        }
    }

    /// Buffered bytes in the ring. Caller must hold the region lock.
    fn used(&self) -> usize {
        self.capacity - self.free_space()
    }

    /// Copy `src` into the ring at `tail`, splitting at the physical end
    /// when the bytes wrap, and advance `tail`.
    ///
    /// # Safety
    /// Caller holds the region lock and has already confirmed at least
    /// `src.len()` bytes of free space.
    unsafe fn write_bytes(&self, src: &[u8]) {
        let tail = self.tail();
        let len = src.len();
        if tail + len <= self.capacity {
            ptr::copy_nonoverlapping(src.as_ptr(), self.data.add(tail), len);
            self.set_tail((tail + len) % self.capacity);
        } else {
            let first = self.capacity - tail;
            ptr::copy_nonoverlapping(src.as_ptr(), self.data.add(tail), first);
            ptr::copy_nonoverlapping(src.as_ptr().add(first), self.data, len - first);
            self.set_tail(len - first);
        }
    }

    /// Mirror of `write_bytes`: copy out of the ring at `head` and advance
    /// `head`.
    ///
    /// # Safety
    /// Caller holds the region lock and has already confirmed at least
    /// `dst.len()` bytes are logically present.
    unsafe fn read_bytes(&self, dst: &mut [u8]) {
        let head = self.head();
        let len = dst.len();
        if head + len <= self.capacity {
            ptr::copy_nonoverlapping(self.data.add(head), dst.as_mut_ptr(), len);
            self.set_head((head + len) % self.capacity);
        } else {
            let first = self.capacity - head;
            ptr::copy_nonoverlapping(self.data.add(head), dst.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(self.data, dst.as_mut_ptr().add(first), len - first);
            self.set_head(len - first);
        }
    }

    /// Write one frame: length prefix plus payload, as a single critical
    /// section. Blocks while the ring lacks space for the whole frame.
    ///
    /// Fails fast with `CapacityExceeded` when the frame could never fit,
    /// since no amount of draining would ever satisfy the wait.
    pub fn push_frame(&self, payload: &[u8]) -> Result<(), QueueError> {
        let framed = FRAME_PREFIX + payload.len();
        if framed >= self.capacity {
            return Err(QueueError::CapacityExceeded {
                framed,
                capacity: self.capacity,
            });
        }

        let hdr = self.header();
        let guard = LockGuard::acquire(self.ops, &hdr.lock)?;
        // Strict inequality keeps one byte unused, so tail never catches
        // head and `head == tail` stays unambiguous.
        while self.free_space() <= framed {
            guard.wait(&hdr.not_full)?;
        }

        unsafe {
            self.write_bytes(&(payload.len() as u32).to_le_bytes());
            self.write_bytes(payload);
        }

        self.ops.signal(&hdr.not_empty)?;
        drop(guard);
        Ok(())
    }

    /// Write the end-of-stream frame: the reserved prefix with no payload.
    pub fn push_close(&self) -> Result<(), QueueError> {
        let hdr = self.header();
        let guard = LockGuard::acquire(self.ops, &hdr.lock)?;
        while self.free_space() <= FRAME_PREFIX {
            guard.wait(&hdr.not_full)?;
        }

        unsafe {
            self.write_bytes(&CLOSE_FRAME.to_le_bytes());
        }

        self.ops.signal(&hdr.not_empty)?;
        drop(guard);
        Ok(())
    }

    /// Read one whole frame, blocking while the ring is empty.
    ///
    /// Returns `Ok(None)` when the frame is the end-of-stream marker. A
    /// length prefix that cannot be backed by ring contents is a fatal
    /// `FramingViolation`; nothing is returned and the offsets are left
    /// where the corruption was detected.
    pub fn pop_frame(&self) -> Result<Option<Vec<u8>>, QueueError> {
        let hdr = self.header();
        let guard = LockGuard::acquire(self.ops, &hdr.lock)?;
        while self.head() == self.tail() {
            guard.wait(&hdr.not_empty)?;
        }

        let mut prefix = [0u8; FRAME_PREFIX];
        unsafe {
            self.read_bytes(&mut prefix);
        }
        let len = u32::from_le_bytes(prefix);
        if len == CLOSE_FRAME {
            self.ops.signal(&hdr.not_full)?;
            return Ok(None);
        }

        let len = len as usize;
        if len > self.max_payload() || len > self.used() {
            tracing::warn!(
                len,
                buffered = self.used(),
                "length prefix exceeds ring contents"
            );
            return Err(QueueError::FramingViolation(format!(
                "length prefix {} exceeds ring contents ({} bytes buffered, {} payload max)",
                len,
                self.used(),
                self.max_payload()
            )));
        }

        let mut payload = vec![0u8; len];
        unsafe {
            self.read_bytes(&mut payload);
        }

        self.ops.signal(&hdr.not_full)?;
        drop(guard);
        Ok(Some(payload))
    }
}

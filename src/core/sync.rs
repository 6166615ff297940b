// Cross-process synchronization capability interface.
//
// The region header reserves three fixed-size cells: one mutual-exclusion
// lock and two condition signals. A backend interprets the cell bytes as its
// own primitive. Queue logic talks only to `SyncOps`, never to a backend
// directly, so the blocking discipline is identical under either backend.

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU32;

use crate::core::futex::FutexSync;
use crate::core::pthread::PthreadSync;
use crate::error::QueueError;

/// Raw storage for one cross-process primitive inside the region header.
///
/// 64 bytes is enough for a glibc `pthread_mutex_t` (40 bytes) or
/// `pthread_cond_t` (48 bytes), and leaves the futex backend's single `u32`
/// with a cache line to itself.
#[repr(C, align(64))]
pub struct SyncCell {
    bytes: UnsafeCell<[u8; SYNC_CELL_SIZE]>,
}

pub const SYNC_CELL_SIZE: usize = 64;

// The cell is only ever accessed through the primitives a backend builds in
// it; those primitives are the synchronization.
unsafe impl Send for SyncCell {}
unsafe impl Sync for SyncCell {}

impl SyncCell {
    pub const fn zeroed() -> Self {
        Self {
            bytes: UnsafeCell::new([0; SYNC_CELL_SIZE]),
        }
    }

    /// Pointer to the cell bytes, for backends that cast to a native type.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.bytes.get() as *mut u8
    }

    /// View of the first four cell bytes as a futex word.
    pub fn as_atomic_u32(&self) -> &AtomicU32 {
        unsafe { &*(self.bytes.get() as *const AtomicU32) }
    }
}

/// Which backend initialized the primitives in a region.
///
/// Recorded in the header at creation; attaching processes must drive the
/// cells with the same backend or the primitives are garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyncKind {
    /// Futex-based mutex and sequence-counter condition (Linux).
    Futex = 1,
    /// `PTHREAD_PROCESS_SHARED` pthread mutex and condition variables.
    Pthread = 2,
}

impl SyncKind {
    pub fn from_raw(raw: u32) -> Option<SyncKind> {
        match raw {
            1 => Some(SyncKind::Futex),
            2 => Some(SyncKind::Pthread),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Lock, wait, and signal operations over header cells.
///
/// `wait` must atomically release the lock, block, and reacquire the lock
/// before returning. Callers always wrap `wait` in a predicate loop, so a
/// spurious return is harmless.
pub trait SyncOps: Send + Sync {
    /// One-time initialization of the lock cell. Creator only.
    fn init_lock(&self, cell: &SyncCell) -> Result<(), QueueError>;

    /// One-time initialization of a condition cell. Creator only.
    fn init_cond(&self, cell: &SyncCell) -> Result<(), QueueError>;

    fn lock(&self, cell: &SyncCell) -> Result<(), QueueError>;

    fn unlock(&self, cell: &SyncCell) -> Result<(), QueueError>;

    /// Release `lock`, block on `cond`, reacquire `lock`.
    fn wait(&self, cond: &SyncCell, lock: &SyncCell) -> Result<(), QueueError>;

    /// Wake a waiter blocked on `cond`. May be called with the lock held.
    fn signal(&self, cond: &SyncCell) -> Result<(), QueueError>;
}

static FUTEX_SYNC: FutexSync = FutexSync;
static PTHREAD_SYNC: PthreadSync = PthreadSync;

/// Backend dispatch for a recorded kind.
pub fn sync_ops(kind: SyncKind) -> &'static dyn SyncOps {
    match kind {
        SyncKind::Futex => &FUTEX_SYNC,
        SyncKind::Pthread => &PTHREAD_SYNC,
    }
}

/// Region lock held for the duration of one framed operation.
///
/// Unlocks on drop so an early return cannot leave the region locked. An
/// unlock failure at drop time cannot be propagated and is logged instead.
pub struct LockGuard<'a> {
    ops: &'a dyn SyncOps,
    cell: &'a SyncCell,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(ops: &'a dyn SyncOps, cell: &'a SyncCell) -> Result<Self, QueueError> {
        ops.lock(cell)?;
        Ok(Self { ops, cell })
    }

    /// Block on `cond` with the guarded lock released, then reacquire.
    pub fn wait(&self, cond: &SyncCell) -> Result<(), QueueError> {
        self.ops.wait(cond, self.cell)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.ops.unlock(self.cell) {
            tracing::error!(error = %e, "failed to release region lock");
        }
    }
}

// Futex-backed sync backend.
//
// The lock is the classic three-state futex mutex (free, held, contended);
// each condition is a sequence counter that waiters snapshot before sleeping.
// Futex operations deliberately omit FUTEX_PRIVATE_FLAG: the words live in a
// MAP_SHARED region and must be visible to every attached process.

use std::sync::atomic::AtomicU32;
#[cfg(target_os = "linux")]
use std::sync::atomic::Ordering::{Acquire, Release};

use crate::core::sync::{SyncCell, SyncOps};
use crate::error::QueueError;

#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Check condition first to avoid the syscall if possible.
    if atomic.load(Ordering::Relaxed) != expected {
        return;
    }

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32, count: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            count,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32) {
    // Fallback for non-Linux: yield instead of blocking.
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32, _count: i32) {
    // No-op on non-Linux.
}

#[cfg(target_os = "linux")]
const MUTEX_FREE: u32 = 0;
#[cfg(target_os = "linux")]
const MUTEX_HELD: u32 = 1;
#[cfg(target_os = "linux")]
const MUTEX_CONTENDED: u32 = 2;

/// Futex backend. Stateless; all state lives in the header cells.
pub struct FutexSync;

#[cfg(target_os = "linux")]
impl SyncOps for FutexSync {
    fn init_lock(&self, cell: &SyncCell) -> Result<(), QueueError> {
        cell.as_atomic_u32().store(MUTEX_FREE, Release);
        Ok(())
    }

    fn init_cond(&self, cell: &SyncCell) -> Result<(), QueueError> {
        cell.as_atomic_u32().store(0, Release);
        Ok(())
    }

    fn lock(&self, cell: &SyncCell) -> Result<(), QueueError> {
        let word = cell.as_atomic_u32();
        if word
            .compare_exchange(MUTEX_FREE, MUTEX_HELD, Acquire, Acquire)
            .is_ok()
        {
            return Ok(());
        }
        // Contended path: mark the lock contended so the holder wakes us,
        // then sleep until the word changes.
        loop {
            if word.swap(MUTEX_CONTENDED, Acquire) == MUTEX_FREE {
                return Ok(());
            }
            futex_wait(word, MUTEX_CONTENDED);
        }
    }

    fn unlock(&self, cell: &SyncCell) -> Result<(), QueueError> {
        let word = cell.as_atomic_u32();
        if word.swap(MUTEX_FREE, Release) == MUTEX_CONTENDED {
            futex_wake(word, 1);
        }
        Ok(())
    }

    fn wait(&self, cond: &SyncCell, lock: &SyncCell) -> Result<(), QueueError> {
        let seq = cond.as_atomic_u32();
        // Snapshot before releasing the lock: a signal fired after the
        // release bumps the sequence, so the sleep below returns at once
        // instead of missing the wakeup.
        let snapshot = seq.load(Acquire);
        self.unlock(lock)?;
        futex_wait(seq, snapshot);
        self.lock(lock)
    }

    fn signal(&self, cond: &SyncCell) -> Result<(), QueueError> {
        let seq = cond.as_atomic_u32();
        seq.fetch_add(1, Release);
        futex_wake(seq, 1);
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl SyncOps for FutexSync {
    fn init_lock(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::SyncInit(QueueError::unsupported("futex sync")))
    }

    fn init_cond(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::SyncInit(QueueError::unsupported("futex sync")))
    }

    fn lock(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("futex sync")))
    }

    fn unlock(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("futex sync")))
    }

    fn wait(&self, _cond: &SyncCell, _lock: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("futex sync")))
    }

    fn signal(&self, _cond: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("futex sync")))
    }
}

// Pthread-backed sync backend.
//
// The native primitives are built inside the header cells with the
// PTHREAD_PROCESS_SHARED attribute, so independent processes mapping the
// same region can lock and wait on them.

use crate::core::sync::{SyncCell, SyncOps};
use crate::error::QueueError;

/// Pthread backend. Stateless; all state lives in the header cells.
pub struct PthreadSync;

#[cfg(target_os = "linux")]
const _: () = {
    use crate::core::sync::SYNC_CELL_SIZE;
    assert!(std::mem::size_of::<libc::pthread_mutex_t>() <= SYNC_CELL_SIZE);
    assert!(std::mem::size_of::<libc::pthread_cond_t>() <= SYNC_CELL_SIZE);
};

#[cfg(target_os = "linux")]
fn check(ret: i32) -> Result<(), QueueError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(QueueError::Sync(std::io::Error::from_raw_os_error(ret)))
    }
}

#[cfg(target_os = "linux")]
fn check_init(ret: i32) -> Result<(), QueueError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(QueueError::SyncInit(std::io::Error::from_raw_os_error(ret)))
    }
}

#[cfg(target_os = "linux")]
impl PthreadSync {
    fn mutex_ptr(cell: &SyncCell) -> *mut libc::pthread_mutex_t {
        cell.as_mut_ptr() as *mut libc::pthread_mutex_t
    }

    fn cond_ptr(cell: &SyncCell) -> *mut libc::pthread_cond_t {
        cell.as_mut_ptr() as *mut libc::pthread_cond_t
    }
}

#[cfg(target_os = "linux")]
impl SyncOps for PthreadSync {
    fn init_lock(&self, cell: &SyncCell) -> Result<(), QueueError> {
        unsafe {
            let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
            check_init(libc::pthread_mutexattr_init(&mut attr))?;
            check_init(libc::pthread_mutexattr_setpshared(
                &mut attr,
                libc::PTHREAD_PROCESS_SHARED,
            ))?;
            let ret = libc::pthread_mutex_init(Self::mutex_ptr(cell), &attr);
            libc::pthread_mutexattr_destroy(&mut attr);
            check_init(ret)
        }
    }

    fn init_cond(&self, cell: &SyncCell) -> Result<(), QueueError> {
        unsafe {
            let mut attr: libc::pthread_condattr_t = std::mem::zeroed();
            check_init(libc::pthread_condattr_init(&mut attr))?;
            check_init(libc::pthread_condattr_setpshared(
                &mut attr,
                libc::PTHREAD_PROCESS_SHARED,
            ))?;
            let ret = libc::pthread_cond_init(Self::cond_ptr(cell), &attr);
            libc::pthread_condattr_destroy(&mut attr);
            check_init(ret)
        }
    }

    fn lock(&self, cell: &SyncCell) -> Result<(), QueueError> {
        check(unsafe { libc::pthread_mutex_lock(Self::mutex_ptr(cell)) })
    }

    fn unlock(&self, cell: &SyncCell) -> Result<(), QueueError> {
        check(unsafe { libc::pthread_mutex_unlock(Self::mutex_ptr(cell)) })
    }

    fn wait(&self, cond: &SyncCell, lock: &SyncCell) -> Result<(), QueueError> {
        check(unsafe { libc::pthread_cond_wait(Self::cond_ptr(cond), Self::mutex_ptr(lock)) })
    }

    fn signal(&self, cond: &SyncCell) -> Result<(), QueueError> {
        check(unsafe { libc::pthread_cond_signal(Self::cond_ptr(cond)) })
    }
}

#[cfg(not(target_os = "linux"))]
impl SyncOps for PthreadSync {
    fn init_lock(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::SyncInit(QueueError::unsupported("pthread sync")))
    }

    fn init_cond(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::SyncInit(QueueError::unsupported("pthread sync")))
    }

    fn lock(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("pthread sync")))
    }

    fn unlock(&self, _cell: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("pthread sync")))
    }

    fn wait(&self, _cond: &SyncCell, _lock: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("pthread sync")))
    }

    fn signal(&self, _cond: &SyncCell) -> Result<(), QueueError> {
        Err(QueueError::Sync(QueueError::unsupported("pthread sync")))
    }
}

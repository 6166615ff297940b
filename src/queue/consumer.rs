use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::error::QueueError;
use crate::queue::region::QueueRegion;

/// Reading end of a queue.
///
/// A dedicated reader thread drains whole frames from the shared ring into
/// a process-local queue, so the cross-process lock is held only for the
/// copy out of the ring, never for application work. `pop` blocks on the
/// local queue alone.
pub struct Consumer {
    local: Arc<LocalQueue>,
    reader: Option<JoinHandle<()>>,
}

/// Consumer-side staging queue. Exclusively owned by this process; its lock
/// and condition never touch the shared region.
struct LocalQueue {
    state: Mutex<LocalState>,
    available: Condvar,
}

struct LocalState {
    items: VecDeque<Vec<u8>>,
    /// The termination frame went past the reader; set after it forwarded
    /// everything pushed before it.
    shutdown: bool,
    /// Fatal reader error, delivered to the next `pop` exactly once.
    failure: Option<QueueError>,
}

impl Consumer {
    pub(crate) fn new(region: QueueRegion) -> Result<Self, QueueError> {
        let region = Arc::new(region);
        let local = Arc::new(LocalQueue {
            state: Mutex::new(LocalState {
                items: VecDeque::new(),
                shutdown: false,
                failure: None,
            }),
            available: Condvar::new(),
        });

        let thread_local = Arc::clone(&local);
        let reader = std::thread::Builder::new()
            .name("shmring-reader".into())
            .spawn(move || reader_loop(region, thread_local))
            .map_err(QueueError::Allocation)?;

        Ok(Self {
            local,
            reader: Some(reader),
        })
    }

    /// Dequeue the next payload, blocking until one is available.
    ///
    /// # Returns
    /// * `Ok(Some(bytes))` for each frame, in push order
    /// * `Ok(None)` once the stream terminated (and on every later call)
    /// * `Err` once if the reader hit a fatal error; later calls see `Ok(None)`
    pub fn pop(&self) -> Result<Option<Vec<u8>>, QueueError> {
        let mut state = self.local.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(Some(item));
            }
            if let Some(failure) = state.failure.take() {
                state.shutdown = true;
                return Err(failure);
            }
            if state.shutdown {
                return Ok(None);
            }
            self.local.available.wait(&mut state);
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let finished = {
            let state = self.local.state.lock();
            state.shutdown || state.failure.is_some()
        };
        if let Some(reader) = self.reader.take() {
            if finished {
                let _ = reader.join();
            }
            // Otherwise the reader is still parked on the shared ring. It
            // owns its own handle to the region and ends with the process;
            // the only way to stop it sooner is the termination frame.
        }
    }
}

fn reader_loop(region: Arc<QueueRegion>, local: Arc<LocalQueue>) {
    tracing::debug!("reader thread started");
    loop {
        match region.ring().pop_frame() {
            Ok(Some(payload)) => {
                let mut state = local.state.lock();
                state.items.push_back(payload);
                drop(state);
                local.available.notify_one();
            }
            Ok(None) => {
                tracing::debug!("reader observed termination frame");
                let mut state = local.state.lock();
                state.shutdown = true;
                drop(state);
                local.available.notify_all();
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "reader thread stopping on fatal error");
                let mut state = local.state.lock();
                state.failure = Some(e);
                drop(state);
                local.available.notify_all();
                break;
            }
        }
    }
}

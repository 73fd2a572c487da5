//manager/queue.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, Notify};

use crate::error::SandboxError;

/// Bookkeeping for the global concurrency cap. Waiters are served in FIFO order.
pub struct Queue {
    max_concurrent: usize,
    running: usize,
    waiting: VecDeque<oneshot::Sender<()>>,
    closed: bool,
}

impl Queue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            running: 0,
            waiting: VecDeque::new(),
            closed: false,
        }
    }

    /// Takes a slot immediately if one is free, otherwise enqueues and returns the
    /// receiver that fires when a slot has been handed over.
    pub fn try_acquire_slot(&mut self) -> Result<Option<oneshot::Receiver<()>>, SandboxError> {
        if self.closed {
            return Err(SandboxError::ShuttingDown);
        }
        if self.running < self.max_concurrent && self.waiting.is_empty() {
            self.running += 1;
            Ok(None)
        } else {
            let (tx, rx) = oneshot::channel();
            self.waiting.push_back(tx);
            Ok(Some(rx))
        }
    }

    /// Called when a job completes. The slot passes directly to the oldest waiter
    /// that is still listening. Returns true when nothing is running any more.
    pub fn release_slot(&mut self) -> bool {
        while let Some(waiter) = self.waiting.pop_front() {
            if waiter.send(()).is_ok() {
                return false;
            }
        }
        self.running = self.running.saturating_sub(1);
        self.running == 0
    }

    pub fn close(&mut self) {
        self.closed = true;
        // Dropping the senders wakes every waiter with an error.
        self.waiting.clear();
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            max_concurrent: self.max_concurrent,
            running: self.running,
            waiting: self.waiting.iter().filter(|tx| !tx.is_closed()).count(),
            accepting: !self.closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub max_concurrent: usize,
    pub running: usize,
    pub waiting: usize,
    pub accepting: bool,
}

/// Shared, thread-safe front of [`Queue`].
pub struct AdmissionControl {
    queue: Mutex<Queue>,
    idle: Notify,
}

impl AdmissionControl {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(Queue::new(max_concurrent)),
            idle: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits up to `wait` for a slot. The slot is held until the returned
    /// [`Slot`] is dropped. Cancelling the future leaves no trace in the queue.
    pub async fn acquire(self: &Arc<Self>, wait: Duration) -> Result<Slot, SandboxError> {
        let pending = self.lock().try_acquire_slot()?;
        if let Some(rx) = pending {
            let mut waiter = Waiter {
                control: Arc::clone(self),
                rx,
                armed: true,
            };
            match tokio::time::timeout(wait, &mut waiter.rx).await {
                Ok(Ok(())) => waiter.armed = false,
                Ok(Err(_)) => return Err(SandboxError::ShuttingDown),
                Err(_) => {
                    tracing::warn!(?wait, "timed out waiting for a sandbox slot");
                    return Err(SandboxError::QueueTimeout(wait));
                }
            }
        }
        Ok(Slot {
            control: Arc::clone(self),
        })
    }

    fn release(&self) {
        let now_idle = self.lock().release_slot();
        if now_idle {
            self.idle.notify_waiters();
        }
    }

    /// Stops admitting work; queued requests fail with `ShuttingDown`.
    pub fn close(&self) {
        self.lock().close();
    }

    /// Waits until no slot is held. Returns false if `limit` elapsed first.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.lock().running == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(limit, drained).await.is_ok()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats()
    }
}

/// A held concurrency slot.
pub struct Slot {
    control: Arc<AdmissionControl>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.control.release();
    }
}

/// A queued request. If it is dropped after a slot was already handed to it,
/// the slot is passed on instead of leaking.
struct Waiter {
    control: Arc<AdmissionControl>,
    rx: oneshot::Receiver<()>,
    armed: bool,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            self.control.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_up_then_queues() {
        let mut q = Queue::new(2);
        assert!(q.try_acquire_slot().unwrap().is_none());
        assert!(q.try_acquire_slot().unwrap().is_none());
        assert!(q.try_acquire_slot().unwrap().is_some());
        let stats = q.stats();
        assert_eq!((stats.running, stats.waiting), (2, 1));
    }

    #[test]
    fn release_hands_slot_to_first_live_waiter() {
        let mut q = Queue::new(1);
        q.try_acquire_slot().unwrap();
        let gone = q.try_acquire_slot().unwrap().unwrap();
        let mut live = q.try_acquire_slot().unwrap().unwrap();
        drop(gone);

        assert!(!q.release_slot());
        assert!(live.try_recv().is_ok());
        assert_eq!(q.stats().running, 1);
        assert!(q.release_slot());
    }

    #[test]
    fn closed_queue_rejects() {
        let mut q = Queue::new(1);
        q.close();
        assert!(matches!(q.try_acquire_slot(), Err(SandboxError::ShuttingDown)));
        assert!(!q.stats().accepting);
    }
}

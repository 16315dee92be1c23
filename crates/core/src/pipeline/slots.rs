//! Bounded admission and concurrency for jobs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::PipelineError;

/// Token pool shared by all jobs.
///
/// Admission is synchronous: at most `max_concurrent + queue_depth` jobs hold
/// an [`AdmissionTicket`]. Of those, at most `max_concurrent` hold a
/// [`SlotPermit`] and may run. Both are released on drop.
#[derive(Debug)]
pub struct SlotPool {
    max_concurrent: usize,
    queue_depth: usize,
    admitted: AtomicUsize,
    active: AtomicUsize,
    semaphore: Arc<Semaphore>,
}

impl SlotPool {
    pub fn new(max_concurrent: usize, queue_depth: usize) -> Arc<Self> {
        Arc::new(Self {
            max_concurrent,
            queue_depth,
            admitted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    pub fn capacity(&self) -> usize {
        self.max_concurrent + self.queue_depth
    }

    /// Jobs currently holding a slot.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Admitted jobs still waiting for a slot.
    pub fn queued(&self) -> usize {
        self.admitted
            .load(Ordering::SeqCst)
            .saturating_sub(self.active())
    }

    /// Admits one job, or returns `None` when the pool and queue are full.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionTicket> {
        let capacity = self.capacity();
        self.admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .ok()?;

        Some(AdmissionTicket {
            pool: Arc::clone(self),
        })
    }
}

/// Proof of admission. Dropping it gives the admission back.
#[derive(Debug)]
pub struct AdmissionTicket {
    pool: Arc<SlotPool>,
}

impl AdmissionTicket {
    /// Waits for a running slot.
    pub async fn acquire(self) -> Result<SlotPermit, PipelineError> {
        let permit = Arc::clone(&self.pool.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::NotRunning)?;
        self.pool.active.fetch_add(1, Ordering::SeqCst);

        Ok(SlotPermit {
            _permit: permit,
            ticket: self,
        })
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.pool.admitted.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running slot. Dropping it frees the slot and the admission.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
    ticket: AdmissionTicket,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.ticket.pool.active.fetch_sub(1, Ordering::SeqCst);
    }
}

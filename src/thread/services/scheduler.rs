//! Delayed-closure scheduling.
//!
//! The scheduler owns the single outstanding timer handle for a thread's
//! pending closure and the durable lifecycle of its persisted record. A
//! thread has at most one armed timer; arming replaces any prior one, and
//! cancellation is idempotent and safe to call even after the timer fired.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::thread::{
    domain::{CorrespondentId, PendingClosure},
    ports::ConfigStore,
    services::ThreadResult,
};

/// One armed timer. The generation tags which `schedule` call spawned the
/// task, so a fired task only ever detaches its own handle.
struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Owns the delayed-close timer and its persisted pending record.
pub struct ClosureScheduler<S>
where
    S: ConfigStore,
{
    config: Arc<S>,
    armed: Arc<Mutex<Option<ArmedTimer>>>,
    generations: AtomicU64,
}

impl<S> ClosureScheduler<S>
where
    S: ConfigStore,
{
    /// Creates a scheduler persisting through the given config store.
    #[must_use]
    pub fn new(config: Arc<S>) -> Self {
        Self {
            config,
            armed: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
        }
    }

    /// Persists the pending record and arms the timer.
    ///
    /// The record write is awaited before the timer is spawned so a process
    /// restart can recover the closure. Any previously armed timer is
    /// replaced, never stacked. When the timer fires, the spawned task
    /// detaches its own handle before running `on_fire`: cancellation
    /// bookkeeping inside the firing path must never abort the task it is
    /// running on.
    ///
    /// # Errors
    ///
    /// Returns a config error when persisting the record fails; no timer is
    /// armed in that case.
    pub async fn schedule<F>(
        &self,
        id: CorrespondentId,
        record: &PendingClosure,
        fire_in: Duration,
        on_fire: F,
    ) -> ThreadResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.store_pending_closure(id, record).await?;

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let armed = Arc::clone(&self.armed);

        // The slot is held across the spawn so the new task cannot observe
        // the registry before its own handle is stored.
        let mut guard = lock_armed(&self.armed);
        let task = tokio::spawn(async move {
            tokio::time::sleep(fire_in).await;
            drop(take_generation(&armed, generation));
            on_fire.await;
        });
        if let Some(previous) = guard.replace(ArmedTimer { generation, task }) {
            previous.task.abort();
        }
        drop(guard);

        tracing::debug!(thread = %id, fire_at = %record.fire_at, "closure armed");
        Ok(())
    }

    /// Cancels the armed timer, if any, and removes the persisted record.
    ///
    /// Idempotent: cancelling when nothing is pending is a no-op, and
    /// cancelling after the timer has fired only clears the stale handle.
    ///
    /// # Errors
    ///
    /// Returns a config error when removing the persisted record fails.
    pub async fn cancel(&self, id: CorrespondentId) -> ThreadResult<()> {
        if let Some(timer) = lock_armed(&self.armed).take() {
            timer.task.abort();
        }
        if self.config.remove_pending_closure(id).await?.is_some() {
            tracing::debug!(thread = %id, "closure cancelled");
        }
        Ok(())
    }

    /// Returns the persisted pending record for a thread, when one exists.
    ///
    /// # Errors
    ///
    /// Returns a config error when the read fails.
    pub async fn pending(&self, id: CorrespondentId) -> ThreadResult<Option<PendingClosure>> {
        Ok(self.config.pending_closure(id).await?)
    }

    /// Returns `true` while a timer handle is outstanding.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        lock_armed(&self.armed).is_some()
    }
}

impl<S> Drop for ClosureScheduler<S>
where
    S: ConfigStore,
{
    fn drop(&mut self) {
        if let Some(timer) = lock_armed(&self.armed).take() {
            timer.task.abort();
        }
    }
}

fn lock_armed(armed: &Mutex<Option<ArmedTimer>>) -> MutexGuard<'_, Option<ArmedTimer>> {
    armed.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Takes the stored handle only when it still belongs to the given
/// generation; a re-armed or cancelled slot is left untouched.
fn take_generation(armed: &Mutex<Option<ArmedTimer>>, generation: u64) -> Option<ArmedTimer> {
    let mut guard = lock_armed(armed);
    if guard
        .as_ref()
        .is_some_and(|timer| timer.generation == generation)
    {
        guard.take()
    } else {
        None
    }
}

//! Schedule manager — debounced, keyed one-shot timers.
//!
//! Each key holds at most one pending timer. Scheduling on a key that already
//! has a timer replaces it, which is what gives motion sensors and friends
//! their debounce semantics: every re-arm pushes the pending message further
//! into the future.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hearth_domain::key::KeyPath;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;

/// Keyed timer registry shared by the whole runtime.
///
/// Methods are synchronous so topic handlers (which run on the broker pump
/// thread, outside any async context of their own) can call them directly.
pub struct ScheduleManager<M> {
    dispatcher: Dispatcher<M>,
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl<M: Send + 'static> ScheduleManager<M> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher<M>) -> Self {
        Self {
            dispatcher,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Dispatches `msg` after `delay`, replacing any pending timer for `key`.
    pub fn dispatch_after(&self, key: String, delay: Duration, msg: M) {
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            dispatcher.dispatch(msg);
        });
        if let Some(previous) = self.lock_timers().insert(key, handle) {
            previous.abort();
        }
    }

    /// Dispatches `msg` immediately and cancels any pending timer for `key`.
    pub fn dispatch_now(&self, key: &str, msg: M) {
        self.cancel(key);
        self.dispatcher.dispatch(msg);
    }

    /// Cancels the pending timer for `key`, if any. Idempotent.
    pub fn cancel(&self, key: &str) {
        if let Some(handle) = self.lock_timers().remove(key) {
            handle.abort();
        }
    }

    /// Enqueues a message without touching any timer.
    pub fn dispatch(&self, msg: M) {
        self.dispatcher.dispatch(msg);
    }

    // A panicked timer task cannot corrupt the map of join handles, so a
    // poisoned lock is safe to recover from.
    fn lock_timers(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> Clone for ScheduleManager<M> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            timers: Arc::clone(&self.timers),
        }
    }
}

/// Path-scoped view over the shared [`ScheduleManager`].
///
/// Device handlers receive one of these; keys they use are joined with the
/// handle's tree path, so two devices with the same leaf key in different
/// containers never collide.
pub struct ScheduleHandle<M> {
    manager: ScheduleManager<M>,
    path: KeyPath,
}

impl<M: Send + 'static> ScheduleHandle<M> {
    #[must_use]
    pub fn new(manager: ScheduleManager<M>, path: KeyPath) -> Self {
        Self { manager, path }
    }

    /// Returns a handle scoped one container deeper.
    #[must_use]
    pub fn push(&self, segment: impl Into<String>) -> Self {
        Self {
            manager: self.manager.clone(),
            path: self.path.push(segment),
        }
    }

    pub fn dispatch_after(&self, key: &str, delay: Duration, msg: M) {
        self.manager.dispatch_after(self.path.join(key), delay, msg);
    }

    pub fn dispatch_now(&self, key: &str, msg: M) {
        self.manager.dispatch_now(&self.path.join(key), msg);
    }

    pub fn cancel(&self, key: &str) {
        self.manager.cancel(&self.path.join(key));
    }

    pub fn dispatch(&self, msg: M) {
        self.manager.dispatch(msg);
    }
}

impl<M> Clone for ScheduleHandle<M> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            path: self.path.clone(),
        }
    }
}

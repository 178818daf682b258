//! Clearable exactly-once lazy initialization.
//!
//! # Responsibility
//! - Hold at most one lazily created instance per slot and hand clones of
//!   it to every caller.
//! - Guarantee exactly one factory invocation per creation cycle under
//!   concurrent access.
//! - Marshal creation onto a designated executor for affinity-bound slots.
//!
//! # Invariants
//! - The slot lock is never held across a factory invocation.
//! - Every caller that joins one creation cycle receives a clone of the
//!   same stored value.
//! - `reset` always wins a race with an in-flight creation: the value is
//!   stored, then discarded, and the net state is empty.
//!
//! # See also
//! - docs/architecture/data-stack.md

use crate::exec::{Executor, ExecutorExt};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

type Factory<T> = dyn Fn() -> T + Send + Sync;

/// Creation cycle state. `Creating` marks a claimed, in-flight factory run.
enum SlotState<T> {
    Empty,
    Creating,
    Ready(T),
}

/// A clearable lazy-initialization slot holding zero or one `T`.
///
/// Cloning the slot clones a handle onto the same shared state, so the
/// factory of a dependent slot can capture its upstream slot by value.
///
/// Fallible factories instantiate `LazySlot<Result<T, E>>`: a stored `Err`
/// is handed to every caller without re-running the factory until
/// [`LazySlot::reset`].
pub struct LazySlot<T> {
    inner: Arc<SlotInner<T>>,
}

struct SlotInner<T> {
    state: Mutex<SlotState<T>>,
    changed: Condvar,
    factory: Box<Factory<T>>,
    affinity: Option<Arc<dyn Executor>>,
}

impl<T> Clone for LazySlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> LazySlot<T> {
    /// Creates a slot with no affinity requirement.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::build(None, factory)
    }

    /// Creates a slot whose factory must run on `executor`.
    pub fn with_affinity(
        executor: Arc<dyn Executor>,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self::build(Some(executor), factory)
    }

    fn build(
        affinity: Option<Arc<dyn Executor>>,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                state: Mutex::new(SlotState::Empty),
                changed: Condvar::new(),
                factory: Box::new(factory),
                affinity,
            }),
        }
    }

    /// Returns a clone of the held value without creating one.
    pub fn ready(&self) -> Option<T>
    where
        T: Clone,
    {
        match &*self.inner.lock_state() {
            SlotState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Forgets the held value so the next access recreates it.
    ///
    /// Runs no cleanup on the outgoing value; callers release the value's
    /// own resources before resetting. When a creation is in flight the
    /// reset waits for its store to land and then empties the slot.
    pub fn reset(&self) {
        let mut state = self.inner.lock_state();
        while matches!(*state, SlotState::Creating) {
            state = self.inner.wait(state);
        }
        *state = SlotState::Empty;
        drop(state);
        // Waiters parked on the discarded cycle re-examine the slot and
        // start a fresh one.
        self.inner.changed.notify_all();
    }
}

impl<T: Clone> LazySlot<T> {
    /// Returns the held value, creating it on the calling thread when the
    /// slot is empty.
    ///
    /// The factory runs at most once per cycle; concurrent callers block
    /// until the claimed creation stores its result, then share it.
    pub fn get_or_create(&self) -> T {
        {
            let mut state = self.inner.lock_state();
            loop {
                match &*state {
                    SlotState::Ready(value) => return value.clone(),
                    SlotState::Creating => state = self.inner.wait(state),
                    SlotState::Empty => {
                        *state = SlotState::Creating;
                        break;
                    }
                }
            }
        }

        // Cycle claimed. The factory (and the clone) run with no lock held
        // so readers of other slots and this slot's waiters never contend
        // with slow I/O.
        let mut claim = ClaimGuard::new(&self.inner);
        let value = (self.inner.factory)();
        let stored = value.clone();
        {
            let mut state = self.inner.lock_state();
            *state = SlotState::Ready(stored);
        }
        self.inner.changed.notify_all();
        claim.disarm();
        value
    }

    /// Returns the held value, marshaling any needed creation onto the
    /// slot's designated executor.
    ///
    /// A ready slot is served without an executor hop. When the calling
    /// thread already is the executor, creation runs inline. Slots built
    /// without an affinity requirement behave like [`Self::get_or_create`].
    pub fn get_or_create_on_executor(&self) -> T
    where
        T: Send + 'static,
    {
        let Some(executor) = self.inner.affinity.clone() else {
            return self.get_or_create();
        };
        if let Some(value) = self.ready() {
            return value;
        }
        let slot = self.clone();
        executor.run_sync(move || slot.get_or_create())
    }
}

impl<T> SlotInner<T> {
    // State mutations never panic while the lock is held, so a poisoned
    // guard still protects a consistent state and is safe to adopt.
    fn lock_state(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, SlotState<T>>) -> MutexGuard<'a, SlotState<T>> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Restores a claimed slot to empty when the factory unwinds, so waiters
/// are not stranded on a cycle that can never complete.
struct ClaimGuard<'a, T> {
    inner: &'a SlotInner<T>,
    armed: bool,
}

impl<'a, T> ClaimGuard<'a, T> {
    fn new(inner: &'a SlotInner<T>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T> Drop for ClaimGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.lock_state();
            *state = SlotState::Empty;
            drop(state);
            self.inner.changed.notify_all();
        }
    }
}

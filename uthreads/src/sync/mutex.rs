//! A cooperative mutex.
//!
//! This guards interleavings between logical threads multiplexed onto the
//! single OS thread the runtime runs on — it is not `std::sync::Mutex` and
//! must not be reached for across real OS threads. Non-reentrant: a thread
//! that locks a [`Mutex`] it already owns deadlocks itself.
//!
//! A `Mutex` value is a cheap, `Clone`-able handle (like `Rc<T>`) rather
//! than the lock itself, so every thread that needs it just clones the
//! handle into its closure. It carries its own interior mutability and is
//! deliberately `!Send`/`!Sync`: the cooperative model has exactly one
//! execution context at a time, so there is nothing to protect against
//! other *OS* threads, and the type system should refuse to let one of
//! these escape onto a real `std::thread`.

use std::cell::UnsafeCell;
use std::rc::Rc;

use crate::runtime::{block_self_and_schedule, current_tid, mark_runnable, Tid, WaitQueue};

struct State {
    locked: bool,
    owner: Option<Tid>,
    waiters: WaitQueue,
}

pub struct Mutex(Rc<UnsafeCell<State>>);

impl Clone for Mutex {
    fn clone(&self) -> Self {
        Mutex(Rc::clone(&self.0))
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutex {
    pub fn new() -> Self {
        Mutex(Rc::new(UnsafeCell::new(State {
            locked: false,
            owner: None,
            waiters: WaitQueue::new(),
        })))
    }

    // A fresh `&mut` taken on every call and never held across a
    // suspension point. No two logical threads are ever actually running
    // at once, so this never aliases in practice — see the module docs.
    fn state(&self) -> &mut State {
        unsafe { &mut *self.0.get() }
    }

    /// Block until the mutex is free, then take it. Re-tests `locked` on
    /// every wake, so spurious wakeups and a waiter being overtaken by
    /// another locker are both handled correctly.
    pub fn lock(&self) {
        loop {
            let state = self.state();
            if !state.locked {
                state.locked = true;
                state.owner = Some(current_tid());
                return;
            }
            state.waiters.push(current_tid());
            block_self_and_schedule();
        }
    }

    /// Attempt to take the mutex without blocking. Returns `true` on
    /// success.
    pub fn try_lock(&self) -> bool {
        let state = self.state();
        if state.locked {
            return false;
        }
        state.locked = true;
        state.owner = Some(current_tid());
        true
    }

    /// Release the mutex, waking at most one waiter. Ownership is not
    /// handed off directly to that waiter — it still re-tests `locked`
    /// after waking, like every other locker.
    ///
    /// A no-op if the caller does not currently own the mutex (contract
    /// violation; the spec has this silently ignored rather than
    /// signaled).
    pub fn unlock(&self) {
        let state = self.state();
        if state.owner != Some(current_tid()) {
            return;
        }
        if let Some(tid) = state.waiters.pop() {
            mark_runnable(tid);
        }
        state.locked = false;
        state.owner = None;
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn owner(&self) -> Option<Tid> {
        self.state().owner
    }
}

//! A counting semaphore.
//!
//! `post` is responsible for waking exactly one blocked waiter per
//! increment, and that waiter's slot is guaranteed — so unlike
//! [`super::mutex::Mutex::lock`], `wait` does not re-test `count` after
//! waking. This is a deliberate contract, not an oversight: it only holds
//! because every `post` wakes at most one waiter and every blocked `wait`
//! is woken by exactly one `post`.
//!
//! Like [`Mutex`](super::mutex::Mutex), a `Semaphore` is a cheap `Clone`
//! handle around shared interior state, and deliberately `!Send`/`!Sync`.

use std::cell::UnsafeCell;
use std::rc::Rc;

use crate::runtime::{block_self_and_schedule, current_tid, mark_runnable, WaitQueue};

struct State {
    count: i64,
    waiters: WaitQueue,
}

pub struct Semaphore(Rc<UnsafeCell<State>>);

impl Clone for Semaphore {
    fn clone(&self) -> Self {
        Semaphore(Rc::clone(&self.0))
    }
}

impl Semaphore {
    pub fn new(initial: i64) -> Self {
        Semaphore(Rc::new(UnsafeCell::new(State {
            count: initial,
            waiters: WaitQueue::new(),
        })))
    }

    fn state(&self) -> &mut State {
        unsafe { &mut *self.0.get() }
    }

    /// Decrement the count; block if it goes negative. The magnitude of a
    /// negative count is the number of threads currently blocked here.
    pub fn wait(&self) {
        let state = self.state();
        state.count -= 1;
        if state.count < 0 {
            state.waiters.push(current_tid());
            block_self_and_schedule();
        }
    }

    /// Increment the count, waking one waiter if any is queued.
    pub fn post(&self) {
        let state = self.state();
        state.count += 1;
        if let Some(tid) = state.waiters.pop() {
            mark_runnable(tid);
        }
    }

    pub fn count(&self) -> i64 {
        self.state().count
    }
}

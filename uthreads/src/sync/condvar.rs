//! A condition variable with Mesa semantics: a woken waiter re-tests the
//! predicate it slept on, because signaling does not hand off the truth
//! of that predicate atomically. The caller must hold the associated
//! [`Mutex`] across `wait`; this is not checked (a contract violation
//! left undefined, per spec).

use std::cell::UnsafeCell;
use std::rc::Rc;

use crate::runtime::{block_self_and_schedule, current_tid, mark_runnable, WaitQueue};

use super::mutex::Mutex;

pub struct Condvar(Rc<UnsafeCell<WaitQueue>>);

impl Clone for Condvar {
    fn clone(&self) -> Self {
        Condvar(Rc::clone(&self.0))
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    pub fn new() -> Self {
        Condvar(Rc::new(UnsafeCell::new(WaitQueue::new())))
    }

    fn waiters(&self) -> &mut WaitQueue {
        unsafe { &mut *self.0.get() }
    }

    /// Release `mutex`, block, then re-acquire `mutex` before returning.
    /// There is no suspension point between the enqueue and the unlock,
    /// so no wakeup can be missed between them.
    pub fn wait(&self, mutex: &Mutex) {
        self.waiters().push(current_tid());
        mutex.unlock();
        block_self_and_schedule();
        mutex.lock();
    }

    /// Wake the longest-waiting thread, if any.
    pub fn signal(&self) {
        if let Some(tid) = self.waiters().pop() {
            mark_runnable(tid);
        }
    }

    /// Wake every waiting thread, in FIFO order.
    pub fn broadcast(&self) {
        while let Some(tid) = self.waiters().pop() {
            mark_runnable(tid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{thread_create, thread_init, thread_join, thread_yield};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn signal_wakes_a_single_waiter_in_fifo_order() {
        let _guard = crate::test_support::serial();
        thread_init();

        let mutex = Mutex::new();
        let cond = Condvar::new();
        let ready = Rc::new(RefCell::new(false));
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut waiter_tids = Vec::new();
        for id in 0..2 {
            let mutex = mutex.clone();
            let cond = cond.clone();
            let ready = Rc::clone(&ready);
            let order = Rc::clone(&order);
            waiter_tids.push(
                thread_create(move || {
                    mutex.lock();
                    while !*ready.borrow() {
                        cond.wait(&mutex);
                    }
                    order.borrow_mut().push(id);
                    mutex.unlock();
                })
                .unwrap(),
            );
            thread_yield();
        }

        // Let both waiters reach `cond.wait` before signaling.
        thread_yield();
        thread_yield();

        mutex.lock();
        *ready.borrow_mut() = true;
        cond.signal();
        mutex.unlock();

        thread_join::<()>(waiter_tids[0]);

        // The first waiter queued (id 0) must be the one signal woke.
        assert_eq!(order.borrow()[0], 0);

        cond.signal();
        thread_join::<()>(waiter_tids[1]);
        assert_eq!(*order.borrow(), vec![0, 1]);
    }
}

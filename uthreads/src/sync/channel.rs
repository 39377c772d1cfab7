//! A bounded, closable FIFO channel built from one [`Mutex`] and two
//! [`Condvar`]s, the same way the runtime's [`super::rwlock::RwLock`] is
//! built from a mutex and two condvars.
//!
//! The ring buffer is an explicit fixed-size `Vec<Option<T>>` with
//! `read_pos`/`write_pos`/`count` bookkeeping, rather than `VecDeque`, so
//! the invariants `0 ≤ count ≤ capacity` and
//! `write_pos = (read_pos + count) mod capacity` are checkable directly
//! against the representation (see `tests/invariants.rs`).

use std::cell::UnsafeCell;
use std::rc::Rc;

use thiserror::Error;

use super::condvar::Condvar;
use super::mutex::Mutex;

/// Returned by [`Channel::send`] when the channel was already closed.
/// Carries the value back, the way `std::sync::mpsc::SendError` does.
#[derive(Debug, Error)]
#[error("send on a closed channel")]
pub struct SendError<T>(pub T);

/// Returned by [`Channel::recv`] when the channel is closed and drained.
#[derive(Debug, Error)]
#[error("recv on a closed, empty channel")]
pub struct RecvError;

struct State<T> {
    buffer: Vec<Option<T>>,
    read_pos: usize,
    write_pos: usize,
    count: usize,
    closed: bool,
}

impl<T> State<T> {
    fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

pub struct Channel<T> {
    state: Rc<UnsafeCell<State<T>>>,
    lock: Mutex,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            state: Rc::clone(&self.state),
            lock: self.lock.clone(),
            not_empty: self.not_empty.clone(),
            not_full: self.not_full.clone(),
        }
    }
}

impl<T> Channel<T> {
    /// Create a channel with room for `capacity` in-flight items. Returns
    /// `None` if `capacity` is zero — a zero-capacity ring buffer cannot
    /// satisfy `write_pos = (read_pos + count) mod N` for any `N = 0`.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, || None);
        Some(Channel {
            state: Rc::new(UnsafeCell::new(State {
                buffer,
                read_pos: 0,
                write_pos: 0,
                count: 0,
                closed: false,
            })),
            lock: Mutex::new(),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    fn state(&self) -> &mut State<T> {
        unsafe { &mut *self.state.get() }
    }

    /// Send `data`, blocking while the channel is full. Fails (returning
    /// the value) if the channel is closed, whether it was already closed
    /// on entry or is closed by another thread while this call blocks.
    pub fn send(&self, data: T) -> Result<(), SendError<T>> {
        self.lock.lock();
        loop {
            let state = self.state();
            if state.closed {
                self.lock.unlock();
                return Err(SendError(data));
            }
            if state.count < state.capacity() {
                break;
            }
            self.not_full.wait(&self.lock);
        }

        let state = self.state();
        let cap = state.capacity();
        state.buffer[state.write_pos] = Some(data);
        state.write_pos = (state.write_pos + 1) % cap;
        state.count += 1;
        self.not_empty.signal();
        self.lock.unlock();
        Ok(())
    }

    /// Receive the next item, blocking while the channel is empty. Fails
    /// once the channel is closed and drained; items sent before `close`
    /// remain deliverable until then.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.lock.lock();
        loop {
            let state = self.state();
            if state.count == 0 {
                if state.closed {
                    self.lock.unlock();
                    return Err(RecvError);
                }
                self.not_empty.wait(&self.lock);
                continue;
            }

            let cap = state.capacity();
            let item = state.buffer[state.read_pos]
                .take()
                .expect("slot within `count` of read_pos must hold a value");
            state.read_pos = (state.read_pos + 1) % cap;
            state.count -= 1;
            self.not_full.signal();
            self.lock.unlock();
            return Ok(item);
        }
    }

    /// Close the channel. Idempotent: closing an already-closed channel
    /// is a no-op beyond re-waking any waiters.
    pub fn close(&self) {
        self.lock.lock();
        self.state().closed = true;
        self.not_empty.broadcast();
        self.not_full.broadcast();
        self.lock.unlock();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{thread_create, thread_init, thread_join};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[test]
    fn channel_producer_consumer_delivers_every_item_once() {
        let _guard = crate::test_support::serial();
        thread_init();

        const ITEMS_PER_PRODUCER: i64 = 10;
        const PRODUCERS: i64 = 3;
        const CONSUMERS: usize = 2;

        let channel: Channel<i64> = Channel::new(5).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut producer_tids = Vec::new();
        for p in 0..PRODUCERS {
            let channel = channel.clone();
            producer_tids.push(
                thread_create(move || {
                    for i in 0..ITEMS_PER_PRODUCER {
                        channel.send(p * 100 + i).expect("channel is not closed yet");
                    }
                })
                .unwrap(),
            );
        }

        let mut consumer_tids = Vec::new();
        for _ in 0..CONSUMERS {
            let channel = channel.clone();
            let seen = Rc::clone(&seen);
            consumer_tids.push(
                thread_create(move || {
                    while let Ok(item) = channel.recv() {
                        seen.borrow_mut().push(item);
                    }
                })
                .unwrap(),
            );
        }

        for tid in producer_tids {
            thread_join::<()>(tid);
        }
        channel.close();
        for tid in consumer_tids {
            thread_join::<()>(tid);
        }

        let seen = seen.borrow();
        assert_eq!(seen.len() as i64, PRODUCERS * ITEMS_PER_PRODUCER);
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(unique.len(), seen.len(), "every item should appear exactly once");
    }

    #[test]
    fn send_after_close_fails_and_returns_the_value() {
        let _guard = crate::test_support::serial();
        thread_init();
        let channel: Channel<i64> = Channel::new(1).unwrap();
        channel.close();
        match channel.send(42) {
            Err(SendError(v)) => assert_eq!(v, 42),
            Ok(()) => panic!("send on a closed channel must fail"),
        }
    }

    #[test]
    fn recv_drains_buffered_items_before_reporting_closed() {
        let _guard = crate::test_support::serial();
        thread_init();
        let channel: Channel<i64> = Channel::new(2).unwrap();
        channel.send(1).unwrap();
        channel.send(2).unwrap();
        channel.close();
        assert_eq!(channel.recv().unwrap(), 1);
        assert_eq!(channel.recv().unwrap(), 2);
        assert!(channel.recv().is_err());
    }

    #[test]
    fn zero_capacity_channel_is_rejected() {
        assert!(Channel::<i64>::new(0).is_none());
    }
}

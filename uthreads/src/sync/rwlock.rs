//! A writer-priority reader/writer lock built from one [`Mutex`] and two
//! [`Condvar`]s: once a writer is waiting, no new reader may enter ahead
//! of it, which prevents writer starvation under a steady stream of
//! readers.
//!
//! This is the primitive `examples/original_source/.../reader_writer.c`
//! hand-builds for its writer-priority scenario; here it is promoted to a
//! reusable type rather than inlined once per program.

use std::cell::UnsafeCell;
use std::rc::Rc;

use super::condvar::Condvar;
use super::mutex::Mutex;

struct State {
    readers_active: u32,
    writers_waiting: u32,
    writer_active: bool,
}

pub struct RwLock {
    state: Rc<UnsafeCell<State>>,
    lock: Mutex,
    readers_ok: Condvar,
    writers_ok: Condvar,
}

impl Clone for RwLock {
    fn clone(&self) -> Self {
        RwLock {
            state: Rc::clone(&self.state),
            lock: self.lock.clone(),
            readers_ok: self.readers_ok.clone(),
            writers_ok: self.writers_ok.clone(),
        }
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RwLock {
    pub fn new() -> Self {
        RwLock {
            state: Rc::new(UnsafeCell::new(State {
                readers_active: 0,
                writers_waiting: 0,
                writer_active: false,
            })),
            lock: Mutex::new(),
            readers_ok: Condvar::new(),
            writers_ok: Condvar::new(),
        }
    }

    fn state(&self) -> &mut State {
        unsafe { &mut *self.state.get() }
    }

    /// Block while a writer is active or any writer is waiting, then
    /// register as an active reader.
    pub fn read_lock(&self) {
        self.lock.lock();
        while self.state().writer_active || self.state().writers_waiting > 0 {
            self.readers_ok.wait(&self.lock);
        }
        self.state().readers_active += 1;
        self.lock.unlock();
    }

    /// Drop out of the active-reader count; wake a waiting writer if this
    /// was the last reader.
    pub fn read_unlock(&self) {
        self.lock.lock();
        self.state().readers_active -= 1;
        if self.state().readers_active == 0 && self.state().writers_waiting > 0 {
            self.writers_ok.signal();
        }
        self.lock.unlock();
    }

    /// Register as a waiting writer (blocking new readers immediately),
    /// then block until no readers and no other writer are active.
    pub fn write_lock(&self) {
        self.lock.lock();
        self.state().writers_waiting += 1;
        while self.state().readers_active > 0 || self.state().writer_active {
            self.writers_ok.wait(&self.lock);
        }
        self.state().writers_waiting -= 1;
        self.state().writer_active = true;
        self.lock.unlock();
    }

    /// Release the write lock. Prefers waking a waiting writer over
    /// readers, preserving writer priority.
    pub fn write_unlock(&self) {
        self.lock.lock();
        self.state().writer_active = false;
        if self.state().writers_waiting > 0 {
            self.writers_ok.signal();
        } else {
            self.readers_ok.broadcast();
        }
        self.lock.unlock();
    }
}

//! Serializes unit tests that touch the process-wide runtime singleton.
//!
//! `cargo test` runs `#[test]` functions from this crate's unit tests on
//! separate OS threads by default, which this crate's single-OS-thread
//! contract forbids doing concurrently against one [`crate::runtime`]
//! instance. Every unit test that calls `thread_init` takes this lock
//! first.
#![cfg(test)]

use std::sync::{Mutex, MutexGuard};

static LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn serial() -> MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Shared-counter race condition, with and without a mutex protecting the
//! critical section.
//!
//! ```bash
//! cargo run -p demos --bin counter-race
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use uthreads::sync::mutex::Mutex;
use uthreads::{thread_create, thread_init, thread_join, thread_yield};

const NUM_THREADS: usize = 3;
const INCREMENTS_PER_THREAD: usize = 1000;

fn test_without_mutex() {
    println!("=== Test WITHOUT Mutex ===");
    let counter = Rc::new(RefCell::new(0i64));

    let tids: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let counter = Rc::clone(&counter);
            let tid = thread_create(move || {
                for _ in 0..INCREMENTS_PER_THREAD {
                    let temp = *counter.borrow();
                    thread_yield();
                    *counter.borrow_mut() = temp + 1;
                }
            })
            .expect("thread table has room");
            println!("Created thread {i} (TID: {tid})");
            tid
        })
        .collect();

    for tid in tids {
        thread_join::<()>(tid);
        println!("Thread {tid} completed");
    }

    let expected = (NUM_THREADS * INCREMENTS_PER_THREAD) as i64;
    let actual = *counter.borrow();
    println!("Expected counter value: {expected}");
    println!("Actual counter value: {actual}");
    if actual != expected {
        println!("RACE CONDITION DETECTED! Counter is incorrect.");
    } else {
        println!("Counter is correct (got lucky without mutex).");
    }
    println!();
}

fn test_with_mutex() {
    println!("=== Test WITH Mutex ===");
    let counter = Rc::new(RefCell::new(0i64));
    let mutex = Mutex::new();

    let tids: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let counter = Rc::clone(&counter);
            let mutex = mutex.clone();
            let tid = thread_create(move || {
                for _ in 0..INCREMENTS_PER_THREAD {
                    mutex.lock();
                    let temp = *counter.borrow();
                    thread_yield();
                    *counter.borrow_mut() = temp + 1;
                    mutex.unlock();
                }
            })
            .expect("thread table has room");
            println!("Created thread {i} (TID: {tid})");
            tid
        })
        .collect();

    for tid in tids {
        thread_join::<()>(tid);
        println!("Thread {tid} completed");
    }

    let expected = (NUM_THREADS * INCREMENTS_PER_THREAD) as i64;
    let actual = *counter.borrow();
    println!("Expected counter value: {expected}");
    println!("Actual counter value: {actual}");
    if actual == expected {
        println!("SUCCESS! Counter is correct with mutex protection.");
    } else {
        println!("FAILURE! Counter is incorrect even with mutex.");
    }
    println!();
}

fn main() {
    env_logger::init();

    println!("Shared Counter Demo");
    println!("====================\n");

    thread_init();
    test_without_mutex();

    thread_init();
    test_with_mutex();

    println!("All demos completed.");
}

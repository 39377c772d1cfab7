//! Writer-priority reader/writer lock: once a writer is waiting, no new
//! reader is admitted ahead of it.
//!
//! ```bash
//! cargo run -p demos --bin reader-writer
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use uthreads::sync::rwlock::RwLock;
use uthreads::{thread_create, thread_init, thread_join, thread_yield};

const NUM_READERS: i64 = 3;
const NUM_WRITERS: i64 = 2;
const READS_PER_READER: i64 = 5;
const WRITES_PER_WRITER: i64 = 3;

fn main() {
    env_logger::init();

    println!("Reader-Writer Lock Demo with Writer Priority");
    println!("=============================================");
    println!("Readers: {NUM_READERS} (each performs {READS_PER_READER} reads)");
    println!("Writers: {NUM_WRITERS} (each performs {WRITES_PER_WRITER} writes)");

    thread_init();

    let shared_data = Rc::new(RefCell::new(0i64));
    println!("Initial shared data: {}\n", shared_data.borrow());

    let rwlock = RwLock::new();
    let mut tids = Vec::new();

    for id in 1..=NUM_READERS {
        let rwlock = rwlock.clone();
        let shared_data = Rc::clone(&shared_data);
        let tid = thread_create(move || {
            for _ in 0..READS_PER_READER {
                rwlock.read_lock();
                let value = *shared_data.borrow();
                println!("Reader {id}: reading value = {value}");
                for _ in 0..100 {
                    thread_yield();
                }
                rwlock.read_unlock();
                thread_yield();
            }
            println!("Reader {id}: finished all reads");
        })
        .expect("thread table has room");
        println!("Created Reader {id} (TID: {tid})");
        tids.push(tid);
    }

    for id in 1..=NUM_WRITERS {
        let rwlock = rwlock.clone();
        let shared_data = Rc::clone(&shared_data);
        let tid = thread_create(move || {
            for _ in 0..WRITES_PER_WRITER {
                rwlock.write_lock();
                *shared_data.borrow_mut() += 1;
                println!("Writer {id}: wrote new value = {}", shared_data.borrow());
                for _ in 0..100 {
                    thread_yield();
                }
                rwlock.write_unlock();
                thread_yield();
            }
            println!("Writer {id}: finished all writes");
        })
        .expect("thread table has room");
        println!("Created Writer {id} (TID: {tid})");
        tids.push(tid);
    }

    println!("\nStarting readers and writers...\n");

    for tid in tids {
        thread_join::<()>(tid);
    }

    println!("\n=== Final Results ===");
    println!("Final shared data value: {}", shared_data.borrow());
    let expected = NUM_WRITERS * WRITES_PER_WRITER;
    println!("Expected value: {expected}");

    if *shared_data.borrow() == expected {
        println!("SUCCESS! All writes completed correctly.");
    } else {
        println!("ERROR! Write count mismatch.");
    }
}

//! Bounded producer/consumer, synchronized with counting semaphores and a
//! mutex guarding the shared ring buffer directly.
//!
//! ```bash
//! cargo run -p demos --bin producer-consumer-sem
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use uthreads::sync::mutex::Mutex;
use uthreads::sync::semaphore::Semaphore;
use uthreads::{thread_create, thread_init, thread_join, thread_yield};

const BUFFER_SIZE: usize = 5;
const ITEMS_PER_PRODUCER: usize = 10;
const NUM_PRODUCERS: usize = 3;
const NUM_CONSUMERS: usize = 2;
const TOTAL_ITEMS: usize = NUM_PRODUCERS * ITEMS_PER_PRODUCER;

fn main() {
    env_logger::init();

    println!("Producer-Consumer Demo with Semaphores");
    println!("=======================================");
    println!("Buffer size: {BUFFER_SIZE}");
    println!("Producers: {NUM_PRODUCERS} (each produces {ITEMS_PER_PRODUCER} items)");
    println!("Consumers: {NUM_CONSUMERS}");
    println!("Total items: {TOTAL_ITEMS}\n");

    thread_init();

    let buffer = Rc::new(RefCell::new(vec![0i64; BUFFER_SIZE]));
    let in_pos = Rc::new(RefCell::new(0usize));
    let out_pos = Rc::new(RefCell::new(0usize));
    let empty = Semaphore::new(BUFFER_SIZE as i64);
    let full = Semaphore::new(0);
    let buffer_mutex = Mutex::new();
    let total_produced = Rc::new(RefCell::new(0usize));
    let total_consumed = Rc::new(RefCell::new(0usize));
    let stats_mutex = Mutex::new();

    let mut producer_tids = Vec::new();
    for id in 1..=NUM_PRODUCERS {
        let buffer = Rc::clone(&buffer);
        let in_pos = Rc::clone(&in_pos);
        let empty = empty.clone();
        let full = full.clone();
        let buffer_mutex = buffer_mutex.clone();
        let total_produced = Rc::clone(&total_produced);
        let stats_mutex = stats_mutex.clone();
        let tid = thread_create(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                let item = id * 100 + i;

                empty.wait();
                buffer_mutex.lock();
                let mut pos = in_pos.borrow_mut();
                buffer.borrow_mut()[*pos] = item as i64;
                println!("Producer {id}: produced item {item} (buffer pos {pos})");
                *pos = (*pos + 1) % BUFFER_SIZE;
                drop(pos);
                buffer_mutex.unlock();

                stats_mutex.lock();
                *total_produced.borrow_mut() += 1;
                stats_mutex.unlock();

                full.post();
                thread_yield();
            }
            println!("Producer {id}: finished producing {ITEMS_PER_PRODUCER} items");
        })
        .expect("thread table has room");
        println!("Created Producer {id} (TID: {tid})");
        producer_tids.push(tid);
    }

    let mut consumer_tids = Vec::new();
    for id in 1..=NUM_CONSUMERS {
        let buffer = Rc::clone(&buffer);
        let out_pos = Rc::clone(&out_pos);
        let empty = empty.clone();
        let full = full.clone();
        let buffer_mutex = buffer_mutex.clone();
        let total_consumed = Rc::clone(&total_consumed);
        let stats_mutex = stats_mutex.clone();
        let tid = thread_create(move || {
            let mut items_consumed = 0;
            loop {
                stats_mutex.lock();
                let consumed = *total_consumed.borrow();
                stats_mutex.unlock();
                if consumed >= TOTAL_ITEMS {
                    break;
                }

                full.wait();
                buffer_mutex.lock();

                stats_mutex.lock();
                if *total_consumed.borrow() >= TOTAL_ITEMS {
                    stats_mutex.unlock();
                    buffer_mutex.unlock();
                    full.post();
                    break;
                }
                stats_mutex.unlock();

                let mut pos = out_pos.borrow_mut();
                let item = buffer.borrow()[*pos];
                println!("Consumer {id}: consumed item {item} (buffer pos {pos})");
                *pos = (*pos + 1) % BUFFER_SIZE;
                drop(pos);
                buffer_mutex.unlock();

                stats_mutex.lock();
                *total_consumed.borrow_mut() += 1;
                stats_mutex.unlock();
                items_consumed += 1;

                empty.post();
                thread_yield();
            }
            println!("Consumer {id}: finished consuming {items_consumed} items");
        })
        .expect("thread table has room");
        println!("Created Consumer {id} (TID: {tid})");
        consumer_tids.push(tid);
    }

    println!("\nStarting production and consumption...\n");

    for tid in producer_tids {
        thread_join::<()>(tid);
    }
    for tid in consumer_tids {
        thread_join::<()>(tid);
    }

    println!("\n=== Final Results ===");
    println!("Total produced: {}", *total_produced.borrow());
    println!("Total consumed: {}", *total_consumed.borrow());

    if *total_consumed.borrow() == TOTAL_ITEMS {
        println!("SUCCESS! All items processed correctly.");
    } else {
        println!("ERROR! Item count mismatch.");
    }
}

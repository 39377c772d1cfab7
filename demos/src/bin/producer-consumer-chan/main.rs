//! Bounded producer/consumer over a closable [`Channel`], demonstrating
//! message passing instead of sharing a buffer directly.
//!
//! ```bash
//! cargo run -p demos --bin producer-consumer-chan
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use uthreads::sync::channel::Channel;
use uthreads::sync::mutex::Mutex;
use uthreads::{thread_create, thread_init, thread_join, thread_yield};

const CHANNEL_CAPACITY: usize = 5;
const ITEMS_PER_PRODUCER: usize = 10;
const NUM_PRODUCERS: usize = 3;
const NUM_CONSUMERS: usize = 2;
const TOTAL_ITEMS: usize = NUM_PRODUCERS * ITEMS_PER_PRODUCER;

fn main() {
    env_logger::init();

    println!("Producer-Consumer Demo with Channels");
    println!("=====================================");
    println!("Channel capacity: {CHANNEL_CAPACITY}");
    println!("Producers: {NUM_PRODUCERS} (each produces {ITEMS_PER_PRODUCER} items)");
    println!("Consumers: {NUM_CONSUMERS}");
    println!("Total items: {TOTAL_ITEMS}\n");

    thread_init();

    let channel: Channel<i64> = match Channel::new(CHANNEL_CAPACITY) {
        Some(channel) => channel,
        None => {
            println!("Failed to create channel");
            return;
        }
    };

    let stats_mutex = Mutex::new();
    let total_produced = Rc::new(RefCell::new(0usize));
    let total_consumed = Rc::new(RefCell::new(0usize));

    let mut producer_tids = Vec::new();
    for id in 1..=NUM_PRODUCERS {
        let channel = channel.clone();
        let stats_mutex = stats_mutex.clone();
        let total_produced = Rc::clone(&total_produced);
        let tid = thread_create(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                let item = (id * 100 + i) as i64;
                match channel.send(item) {
                    Ok(()) => {
                        println!("Producer {id}: produced item {item}");
                        stats_mutex.lock();
                        *total_produced.borrow_mut() += 1;
                        stats_mutex.unlock();
                    }
                    Err(_) => {
                        println!("Producer {id}: channel closed, stopping");
                        break;
                    }
                }
                thread_yield();
            }
            println!("Producer {id}: finished producing");
        })
        .expect("thread table has room");
        println!("Created Producer {id} (TID: {tid})");
        producer_tids.push(tid);
    }

    let mut consumer_tids = Vec::new();
    for id in 1..=NUM_CONSUMERS {
        let channel = channel.clone();
        let stats_mutex = stats_mutex.clone();
        let total_consumed = Rc::clone(&total_consumed);
        let tid = thread_create(move || {
            let mut items_consumed = 0;
            loop {
                match channel.recv() {
                    Ok(item) => {
                        println!("Consumer {id}: consumed item {item}");
                        items_consumed += 1;
                        stats_mutex.lock();
                        *total_consumed.borrow_mut() += 1;
                        stats_mutex.unlock();
                    }
                    Err(_) => {
                        println!("Consumer {id}: channel closed, stopping");
                        break;
                    }
                }
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

    println!("\nAll producers finished. Closing channel...");
    channel.close();

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

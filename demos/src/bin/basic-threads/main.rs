//! Thread creation, yielding, and joining, with return values flowing
//! back to the caller.
//!
//! ```bash
//! cargo run -p demos --bin basic-threads
//! ```

use uthreads::{thread_create, thread_init, thread_join, thread_self, thread_yield};

fn simple_thread(thread_num: i32) -> i32 {
    println!("Thread {thread_num}: Hello from thread!");

    for i in 0..3 {
        println!("Thread {thread_num}: Iteration {i}");
        thread_yield();
    }

    println!("Thread {thread_num}: Exiting");
    thread_num * 100
}

fn main() {
    env_logger::init();

    println!("Basic Threading Demo");
    println!("====================\n");

    thread_init();
    println!("Threading system initialized");
    println!("Main thread TID: {}\n", thread_self());

    const NUM_THREADS: i32 = 3;
    println!("Creating {NUM_THREADS} threads...");
    let tids: Vec<_> = (1..=NUM_THREADS)
        .map(|i| {
            let tid = thread_create(move || simple_thread(i)).expect("thread table has room");
            println!("Created thread {i} (TID: {tid})");
            tid
        })
        .collect();
    println!();

    println!("Main thread yielding to let threads run...\n");
    thread_yield();

    println!("Main thread joining threads...");
    for tid in tids {
        let retval: i32 = thread_join(tid).expect("thread is joinable exactly once");
        println!("Joined tid {tid}, return value: {retval}");
    }

    println!("\nAll threads completed successfully!");
}

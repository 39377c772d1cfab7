//! End-to-end scenarios exercising the public API as a caller would,
//! rather than reaching into crate-private state the way the unit tests
//! alongside each primitive do.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Mutex as StdMutex;

use uthreads::sync::channel::Channel;
use uthreads::sync::condvar::Condvar;
use uthreads::sync::mutex::Mutex;
use uthreads::sync::rwlock::RwLock;
use uthreads::sync::semaphore::Semaphore;
use uthreads::{thread_create, thread_init, thread_join, thread_self, thread_yield};

/// `cargo test` runs every `#[test]` in this file on its own OS thread by
/// default, but `uthreads` keeps exactly one process-wide runtime. This
/// guard keeps the scenarios below from interleaving with each other.
static LOCK: StdMutex<()> = StdMutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn basic_thread_creation_and_join() {
    let _guard = serial();
    thread_init();

    let main_tid = thread_self();
    assert_eq!(main_tid, 0);

    let tids: Vec<_> = (1..=3)
        .map(|n| thread_create(move || -> i32 { n * 100 }).unwrap())
        .collect();

    thread_yield();

    let results: Vec<i32> = tids.into_iter().map(|tid| thread_join(tid).unwrap()).collect();
    assert_eq!(results, vec![100, 200, 300]);
}

#[test]
fn counter_without_mutex_can_lose_updates() {
    let _guard = serial();
    thread_init();

    let counter = Rc::new(RefCell::new(0i64));
    let tids: Vec<_> = (0..3)
        .map(|_| {
            let counter = Rc::clone(&counter);
            thread_create(move || {
                for _ in 0..1000 {
                    let v = *counter.borrow();
                    thread_yield();
                    *counter.borrow_mut() = v + 1;
                }
            })
            .unwrap()
        })
        .collect();

    for tid in tids {
        thread_join::<()>(tid);
    }

    assert!(*counter.borrow() <= 3000);
}

#[test]
fn counter_with_mutex_is_always_exact() {
    let _guard = serial();
    thread_init();

    let counter = Rc::new(RefCell::new(0i64));
    let mutex = Mutex::new();
    let tids: Vec<_> = (0..3)
        .map(|_| {
            let counter = Rc::clone(&counter);
            let mutex = mutex.clone();
            thread_create(move || {
                for _ in 0..1000 {
                    mutex.lock();
                    let v = *counter.borrow();
                    thread_yield();
                    *counter.borrow_mut() = v + 1;
                    mutex.unlock();
                }
            })
            .unwrap()
        })
        .collect();

    for tid in tids {
        thread_join::<()>(tid);
    }

    assert_eq!(*counter.borrow(), 3000);
}

#[test]
fn bounded_buffer_via_semaphores_delivers_every_item() {
    let _guard = serial();
    thread_init();

    const CAPACITY: usize = 4;
    const PER_PRODUCER: i64 = 8;
    const PRODUCERS: i64 = 2;
    const TOTAL: i64 = PRODUCERS * PER_PRODUCER;

    let buffer = Rc::new(RefCell::new(vec![0i64; CAPACITY]));
    let in_pos = Rc::new(RefCell::new(0usize));
    let out_pos = Rc::new(RefCell::new(0usize));
    let empty = Semaphore::new(CAPACITY as i64);
    let full = Semaphore::new(0);
    let buffer_mutex = Mutex::new();
    let consumed = Rc::new(RefCell::new(Vec::new()));
    let consumed_mutex = Mutex::new();

    let mut tids = Vec::new();
    for p in 0..PRODUCERS {
        let buffer = Rc::clone(&buffer);
        let in_pos = Rc::clone(&in_pos);
        let empty = empty.clone();
        let full = full.clone();
        let buffer_mutex = buffer_mutex.clone();
        tids.push(thread_create(move || {
            for i in 0..PER_PRODUCER {
                empty.wait();
                buffer_mutex.lock();
                let mut pos = in_pos.borrow_mut();
                buffer.borrow_mut()[*pos] = p * 100 + i;
                *pos = (*pos + 1) % CAPACITY;
                drop(pos);
                buffer_mutex.unlock();
                full.post();
            }
        }));
    }

    let consumer_tid = {
        let buffer = Rc::clone(&buffer);
        let out_pos = Rc::clone(&out_pos);
        let empty = empty.clone();
        let full = full.clone();
        let buffer_mutex = buffer_mutex.clone();
        let consumed = Rc::clone(&consumed);
        let consumed_mutex = consumed_mutex.clone();
        thread_create(move || {
            for _ in 0..TOTAL {
                full.wait();
                buffer_mutex.lock();
                let mut pos = out_pos.borrow_mut();
                let item = buffer.borrow()[*pos];
                *pos = (*pos + 1) % CAPACITY;
                drop(pos);
                buffer_mutex.unlock();
                empty.post();

                consumed_mutex.lock();
                consumed.borrow_mut().push(item);
                consumed_mutex.unlock();
            }
        })
        .unwrap()
    };

    for tid in tids {
        thread_join::<()>(tid.unwrap());
    }
    thread_join::<()>(consumer_tid);

    let consumed = consumed.borrow();
    assert_eq!(consumed.len() as i64, TOTAL);
    let unique: HashSet<_> = consumed.iter().copied().collect();
    assert_eq!(unique.len(), consumed.len());
}

#[test]
fn channel_delivers_every_item_exactly_once_and_then_closes() {
    let _guard = serial();
    thread_init();

    const PER_PRODUCER: i64 = 8;
    const PRODUCERS: i64 = 3;
    const TOTAL: i64 = PRODUCERS * PER_PRODUCER;

    let channel: Channel<i64> = Channel::new(3).unwrap();
    let producer_tids: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let channel = channel.clone();
            thread_create(move || {
                for i in 0..PER_PRODUCER {
                    channel.send(p * 100 + i).unwrap();
                }
            })
            .unwrap()
        })
        .collect();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let consumer_tid = {
        let channel = channel.clone();
        let seen = Rc::clone(&seen);
        thread_create(move || {
            while let Ok(item) = channel.recv() {
                seen.borrow_mut().push(item);
            }
        })
        .unwrap()
    };

    for tid in producer_tids {
        thread_join::<()>(tid);
    }
    channel.close();
    thread_join::<()>(consumer_tid);

    let seen = seen.borrow();
    assert_eq!(seen.len() as i64, TOTAL);
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len());
    assert!(channel.is_closed());
    assert!(channel.is_empty());
}

#[test]
fn writer_priority_rwlock_never_loses_or_duplicates_a_write() {
    let _guard = serial();
    thread_init();

    const READERS: i64 = 3;
    const WRITERS: i64 = 2;
    const WRITES_PER_WRITER: i64 = 4;

    let rwlock = RwLock::new();
    let shared = Rc::new(RefCell::new(0i64));

    let mut tids = Vec::new();
    for _ in 0..READERS {
        let rwlock = rwlock.clone();
        let shared = Rc::clone(&shared);
        tids.push(thread_create(move || {
            for _ in 0..6 {
                rwlock.read_lock();
                let _ = *shared.borrow();
                thread_yield();
                rwlock.read_unlock();
                thread_yield();
            }
        }));
    }
    for _ in 0..WRITERS {
        let rwlock = rwlock.clone();
        let shared = Rc::clone(&shared);
        tids.push(thread_create(move || {
            for _ in 0..WRITES_PER_WRITER {
                rwlock.write_lock();
                *shared.borrow_mut() += 1;
                thread_yield();
                rwlock.write_unlock();
                thread_yield();
            }
        }));
    }

    for tid in tids {
        thread_join::<()>(tid.unwrap());
    }

    assert_eq!(*shared.borrow(), WRITERS * WRITES_PER_WRITER);
}

#[test]
fn condvar_predicate_rechecks_on_every_wake() {
    let _guard = serial();
    thread_init();

    let mutex = Mutex::new();
    let condvar = Condvar::new();
    let turn = Rc::new(RefCell::new(0u32));
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut tids = Vec::new();
    for id in 0..3u32 {
        let mutex = mutex.clone();
        let condvar = condvar.clone();
        let turn = Rc::clone(&turn);
        let log = Rc::clone(&log);
        tids.push(
            thread_create(move || {
                mutex.lock();
                while *turn.borrow() != id {
                    condvar.wait(&mutex);
                }
                log.borrow_mut().push(id);
                *turn.borrow_mut() = id + 1;
                condvar.broadcast();
                mutex.unlock();
            })
            .unwrap(),
        );
    }

    for tid in tids {
        thread_join::<()>(tid);
    }

    assert_eq!(*log.borrow(), vec![0, 1, 2]);
}

//! A cooperative (M:1) user-level threading runtime: one round-robin
//! scheduler, raw context switching, and a small set of blocking
//! synchronization primitives, all multiplexed onto a single OS thread.
//!
//! There is no preemption and no parallelism — a thread keeps the CPU
//! until it calls [`thread_yield`], [`thread_exit`], blocks on
//! [`thread_join`], or blocks inside a [`sync`] primitive. Two logical
//! threads are never actually executing at the same instant, which is
//! what lets the primitives in [`sync`] use plain interior mutability
//! instead of atomics.
//!
//! ```no_run
//! use uthreads::{thread_create, thread_init, thread_join};
//!
//! thread_init();
//! let child = thread_create(|| 1 + 1).unwrap();
//! let result: i32 = thread_join(child).unwrap();
//! assert_eq!(result, 2);
//! ```
#![feature(naked_functions)]

mod context;
mod runtime;
pub mod sync;

mod test_support;

pub use runtime::{
    thread_create, thread_exit, thread_init, thread_join, thread_self, thread_yield, Tid,
    MAX_THREADS, STACK_SIZE,
};

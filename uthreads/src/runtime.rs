//! Thread table, round-robin scheduler and lifecycle API.
//!
//! Everything here operates on a single process-wide [`Runtime`] instance.
//! There is exactly one OS thread involved; "concurrency" is purely the
//! interleaving of logical threads at the suspension points named in the
//! crate docs (`thread_yield`, `thread_join`, `thread_exit`, a contended
//! `Mutex`/`Semaphore`/`Condvar`, or channel I/O).

use std::any::Any;
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::OnceLock;

use log::{debug, trace, warn};

use crate::context::{build_initial_stack, switch, ThreadContext};

/// Fixed size of the thread table. Slot 0 is always the bootstrap thread.
pub const MAX_THREADS: usize = 16;

/// Stack size allotted to every spawned thread.
pub const STACK_SIZE: usize = 8 * 1024;

/// A thread identifier. Unique over the lifetime of the process until the
/// slot that held it is reaped by `thread_join`.
pub type Tid = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadState {
    Unused,
    Runnable,
    Running,
    Blocked,
    Terminated,
}

type Entry = Box<dyn FnOnce() -> Box<dyn Any>>;

pub(crate) struct Tcb {
    pub tid: Tid,
    pub state: ThreadState,
    stack: Option<Vec<u8>>,
    pub ctx: ThreadContext,
    entry: Option<Entry>,
    pub retval: Option<Box<dyn Any>>,
    pub waiting_on: Option<Tid>,
}

impl Tcb {
    fn empty() -> Self {
        Tcb {
            tid: 0,
            state: ThreadState::Unused,
            stack: None,
            ctx: ThreadContext::default(),
            entry: None,
            retval: None,
            waiting_on: None,
        }
    }
}

/// A FIFO of tids. Holding tids rather than TCB references decouples the
/// queue from slot reuse: a stale tid at the head of the queue is simply
/// skipped when it no longer maps to a live thread (see [`mark_runnable`]).
#[derive(Default)]
pub(crate) struct WaitQueue(VecDeque<Tid>);

impl WaitQueue {
    pub(crate) fn new() -> Self {
        WaitQueue(VecDeque::new())
    }

    pub(crate) fn push(&mut self, tid: Tid) {
        self.0.push_back(tid);
    }

    pub(crate) fn pop(&mut self) -> Option<Tid> {
        self.0.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) struct Runtime {
    threads: Vec<Tcb>,
    current: usize,
    next_tid: Tid,
}

struct RuntimeCell(UnsafeCell<Runtime>);

// SAFETY: `Runtime` is only ever accessed from the single OS thread that
// called `thread_init` and the logical threads it multiplexes onto that
// one OS thread; there is never a second OS thread touching this cell.
unsafe impl Sync for RuntimeCell {}

static RUNTIME: OnceLock<RuntimeCell> = OnceLock::new();

/// Initialize the runtime: mark slot 0 (the bootstrap thread) `Running`
/// with `tid = 0`, and every other slot `Unused`.
///
/// A second call is a contract violation (spec: "double `thread_init`")
/// and is silently ignored — the first call's runtime stays in place.
pub fn thread_init() {
    let mut threads = Vec::with_capacity(MAX_THREADS);
    threads.push(Tcb {
        tid: 0,
        state: ThreadState::Running,
        stack: None,
        ctx: ThreadContext::default(),
        entry: None,
        retval: None,
        waiting_on: None,
    });
    for _ in 1..MAX_THREADS {
        threads.push(Tcb::empty());
    }

    let runtime = Runtime {
        threads,
        current: 0,
        next_tid: 1,
    };

    if RUNTIME.set(RuntimeCell(UnsafeCell::new(runtime))).is_err() {
        warn!("thread_init called more than once; ignoring re-entry");
    } else {
        debug!("runtime initialized with {MAX_THREADS} slots");
    }
}

fn rt() -> *mut Runtime {
    RUNTIME
        .get()
        .expect("uthreads::thread_init must be called before any other runtime operation")
        .0
        .get()
}

impl Runtime {
    /// Demote a `Running` current thread to `Runnable`, then hand the CPU
    /// to the next `Runnable` slot found by a round-robin scan starting
    /// just after `current`. Falls back to letting `current` continue if
    /// it is still `Runnable` and nothing else is. Returns without
    /// switching if no slot is runnable at all.
    fn schedule(&mut self) {
        if self.threads[self.current].state == ThreadState::Running {
            self.threads[self.current].state = ThreadState::Runnable;
        }

        let start = self.current;
        let len = self.threads.len();
        let mut pos = (start + 1) % len;
        let mut next = None;
        while pos != start {
            if self.threads[pos].state == ThreadState::Runnable {
                next = Some(pos);
                break;
            }
            pos = (pos + 1) % len;
        }

        let next = match next {
            Some(p) => p,
            None if self.threads[start].state == ThreadState::Runnable => start,
            None => {
                warn!("schedule(): no runnable thread; returning without switching (deadlock)");
                return;
            }
        };

        self.threads[next].state = ThreadState::Running;
        let old = self.current;
        self.current = next;

        if old != next {
            trace!(
                "switching from tid {} (slot {old}) to tid {} (slot {next})",
                self.threads[old].tid,
                self.threads[next].tid,
            );
        }

        // SAFETY: `old` and `next` are valid slot indices; the pointers
        // are only read/written by `switch` and do not outlive this call.
        unsafe {
            let old_ctx: *mut ThreadContext = &mut self.threads[old].ctx;
            let new_ctx: *const ThreadContext = &self.threads[next].ctx;
            switch(old_ctx, new_ctx);
        }
    }
}

/// Entered via `ret` the first time a freshly created thread is switched
/// to. Runs the thread's boxed entry closure to completion, then exits
/// with its result. Never returns.
unsafe extern "C" fn thread_entry_trampoline() -> ! {
    let entry = {
        let runtime = &mut *rt();
        let idx = runtime.current;
        runtime.threads[idx]
            .entry
            .take()
            .expect("thread_entry_trampoline invoked on a slot with no entry closure")
    };
    let retval = entry();
    exit_with(retval)
}

fn exit_with(retval: Box<dyn Any>) -> ! {
    let runtime = unsafe { &mut *rt() };
    let idx = runtime.current;
    let tid = runtime.threads[idx].tid;

    runtime.threads[idx].retval = Some(retval);
    runtime.threads[idx].state = ThreadState::Terminated;

    for t in runtime.threads.iter_mut() {
        if t.waiting_on == Some(tid) {
            t.waiting_on = None;
            t.state = ThreadState::Runnable;
        }
    }

    debug!("tid {tid} terminated");
    runtime.schedule();

    // Only reached if schedule() found nothing runnable. The spec
    // requires we never fall back onto this (terminated) thread's stack.
    loop {
        std::hint::spin_loop();
    }
}

/// Create a new thread running `f` to completion, returning its tid, or
/// `None` if the thread table is full.
pub fn thread_create<F, R>(f: F) -> Option<Tid>
where
    F: FnOnce() -> R + 'static,
    R: 'static,
{
    let runtime = unsafe { &mut *rt() };
    let slot = runtime
        .threads
        .iter()
        .position(|t| t.state == ThreadState::Unused)?;

    let tid = runtime.next_tid;
    runtime.next_tid += 1;

    let mut stack = vec![0u8; STACK_SIZE];
    // SAFETY: `stack` is freshly allocated and not yet referenced by any
    // live `ThreadContext`.
    let rsp = unsafe { build_initial_stack(&mut stack, thread_entry_trampoline) };

    let tcb = &mut runtime.threads[slot];
    tcb.tid = tid;
    tcb.state = ThreadState::Runnable;
    tcb.stack = Some(stack);
    tcb.ctx = ThreadContext {
        rsp,
        ..ThreadContext::default()
    };
    tcb.entry = Some(Box::new(move || -> Box<dyn Any> { Box::new(f()) }));
    tcb.retval = None;
    tcb.waiting_on = None;

    debug!("created tid {tid} in slot {slot}");
    Some(tid)
}

/// The tid of the currently running thread.
pub fn thread_self() -> Tid {
    let runtime = unsafe { &mut *rt() };
    runtime.threads[runtime.current].tid
}

/// Voluntarily give up the CPU. The calling thread becomes `Runnable`
/// again and may be resumed on any later `schedule()`.
pub fn thread_yield() {
    let runtime = unsafe { &mut *rt() };
    let cur = runtime.current;
    runtime.threads[cur].state = ThreadState::Runnable;
    trace!("tid {} yielding", runtime.threads[cur].tid);
    runtime.schedule();
}

/// Terminate the calling thread with `retval`, waking any thread blocked
/// in `thread_join` on this tid. Never returns.
pub fn thread_exit<R: 'static>(retval: R) -> ! {
    exit_with(Box::new(retval))
}

/// Block until the thread identified by `tid` terminates, then reap its
/// slot and return its result. Returns `None` immediately if `tid` does
/// not currently name a live (non-`Unused`) thread.
///
/// Only one thread should join a given tid; concurrent joins on the same
/// target are undefined, per spec.
pub fn thread_join<R: 'static>(tid: Tid) -> Option<R> {
    loop {
        let runtime = unsafe { &mut *rt() };
        let idx = runtime
            .threads
            .iter()
            .position(|t| t.tid == tid && t.state != ThreadState::Unused)?;

        if runtime.threads[idx].state == ThreadState::Terminated {
            let retval = runtime.threads[idx].retval.take();
            runtime.threads[idx].state = ThreadState::Unused;
            runtime.threads[idx].tid = 0;
            runtime.threads[idx].stack = None;
            runtime.threads[idx].waiting_on = None;
            debug!("reaped tid {tid} from slot {idx}");
            return retval.and_then(|b| b.downcast::<R>().ok()).map(|b| *b);
        }

        let cur = runtime.current;
        runtime.threads[cur].waiting_on = Some(tid);
        runtime.threads[cur].state = ThreadState::Blocked;
        runtime.schedule();
    }
}

/// The tid of the currently running thread, for use by synchronization
/// primitives that need to enqueue or identify the caller.
pub(crate) fn current_tid() -> Tid {
    thread_self()
}

/// Mark the calling thread `Blocked` and hand control to the scheduler.
/// Used by synchronization primitives after enqueuing the caller on a
/// wait queue.
pub(crate) fn block_self_and_schedule() {
    let runtime = unsafe { &mut *rt() };
    let cur = runtime.current;
    runtime.threads[cur].state = ThreadState::Blocked;
    runtime.schedule();
}

/// Mark `tid` `Runnable` if it still names a live thread; a no-op
/// otherwise (the "skip-on-miss" semantics wait queues rely on).
pub(crate) fn mark_runnable(tid: Tid) {
    let runtime = unsafe { &mut *rt() };
    if let Some(t) = runtime
        .threads
        .iter_mut()
        .find(|t| t.tid == tid && t.state != ThreadState::Unused)
    {
        t.state = ThreadState::Runnable;
    }
}

//! Raw context switch and stack setup.
//!
//! This is the only module in the crate that touches raw pointers and
//! inline assembly. Everything above it deals in `ThreadContext` values
//! and `Vec<u8>` stacks; this module is where those get turned into an
//! actual register save/restore and a jump onto a freshly built stack.

use std::arch::asm;

#[cfg(not(all(target_arch = "x86_64", any(target_os = "linux", target_os = "macos"))))]
compile_error!("uthreads's context switch is implemented for x86_64 Linux/macOS only");

/// The callee-saved register set that must survive a context switch, per
/// the System V AMD64 calling convention.
#[derive(Debug, Default)]
#[repr(C)]
pub(crate) struct ThreadContext {
    pub rsp: u64,
    r15: u64,
    r14: u64,
    r13: u64,
    r12: u64,
    rbx: u64,
    rbp: u64,
}

/// Save the callee-saved registers of the calling thread into `*old`, then
/// load the callee-saved registers of `*new` and resume there.
///
/// # Safety
///
/// `old` and `new` must each point to a valid, live `ThreadContext`, and
/// `new.rsp` must point into a stack region that either holds a previously
/// suspended call frame (built by an earlier `switch`) or a frame built by
/// [`build_initial_stack`].
#[naked]
#[no_mangle]
#[cfg_attr(target_os = "macos", export_name = "\x01uthreads_switch")]
pub(crate) unsafe extern "C" fn switch(old: *mut ThreadContext, new: *const ThreadContext) {
    asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], r15",
        "mov [rdi + 0x10], r14",
        "mov [rdi + 0x18], r13",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], rbx",
        "mov [rdi + 0x30], rbp",
        "mov rsp, [rsi + 0x00]",
        "mov r15, [rsi + 0x08]",
        "mov r14, [rsi + 0x10]",
        "mov r13, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov rbx, [rsi + 0x28]",
        "mov rbp, [rsi + 0x30]",
        "ret",
        options(noreturn)
    );
}

/// Build the initial call frame on `stack` so that the first [`switch`]
/// into it resumes execution at `trampoline`, and return the `rsp` value
/// to store in that thread's [`ThreadContext`].
///
/// `trampoline` must never return — it is entered via `ret`, not `call`,
/// so there is no caller frame left to return into.
///
/// # Safety
///
/// `stack` must be a stack-sized allocation not currently in use by any
/// other thread.
pub(crate) unsafe fn build_initial_stack(
    stack: &mut [u8],
    trampoline: unsafe extern "C" fn() -> !,
) -> u64 {
    let size = stack.len();
    let stack_bottom = stack.as_mut_ptr().add(size);
    // Round down to a 16-byte boundary; `ret` will then land on
    // `trampoline` with rsp % 16 == 8, matching the ABI's expectation for
    // the first instruction of a called function.
    let aligned = (stack_bottom as usize & !0xf) as *mut u8;
    let slot = aligned.offset(-16) as *mut u64;
    std::ptr::write(slot, trampoline as u64);
    slot as u64
}

/*!
 * CPU Checkpoints
 *
 * Register save areas and the routine that swaps them. A checkpoint holds
 * exactly the callee-saved state of the platform ABI; everything else is
 * either dead across a call or lives on the (saved) stack.
 *
 * `switch_context(from, to)` stores the current state into `from` and
 * continues from `to`. It returns when some later switch names `from` as
 * its target. Saved stack pointers are exact: the live part of a suspended
 * stack is `[sp, top)`.
 */

#[cfg(not(all(unix, any(target_arch = "x86_64", target_arch = "aarch64"))))]
compile_error!("procsim context switching supports x86_64 and aarch64 on Unix targets only");

/// Emit a global assembly function under its C symbol name
macro_rules! global_function {
    ($name:literal, $($line:literal),* $(,)?) => {
        #[cfg(not(target_vendor = "apple"))]
        std::arch::global_asm!(concat!(
            ".text\n",
            ".p2align 4\n",
            ".globl ", $name, "\n",
            $name, ":\n",
            $($line, "\n",)*
        ));
        #[cfg(target_vendor = "apple")]
        std::arch::global_asm!(concat!(
            ".text\n",
            ".p2align 4\n",
            ".globl _", $name, "\n",
            "_", $name, ":\n",
            $($line, "\n",)*
        ));
    };
}

/// Process entry point reached by the first switch into a fresh stack
pub(crate) type EntryFn = extern "C" fn() -> !;

extern "C" {
    fn procsim_switch_context(from: *mut Registers, to: *const Registers);
}

/// Save the running state into `from` and resume `to`
///
/// # Safety
/// `from` must be writable and stay valid until something switches back to
/// it. `to` must hold a checkpoint produced by `Registers::fresh` or by an
/// earlier switch whose stack bytes are in place again.
#[inline(always)]
pub(crate) unsafe fn switch_context(from: *mut Registers, to: *const Registers) {
    procsim_switch_context(from, to);
}

// -----------------------------------------------------------------------------
// x86_64 System V
// -----------------------------------------------------------------------------

/// Callee-saved register file
#[cfg(target_arch = "x86_64")]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Registers {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    mxcsr: u32,
    fpu_cw: u16,
    _pad: u16,
}

#[cfg(target_arch = "x86_64")]
global_function!(
    "procsim_switch_context",
    "mov qword ptr [rdi + 0x00], rsp",
    "mov qword ptr [rdi + 0x08], rbp",
    "mov qword ptr [rdi + 0x10], rbx",
    "mov qword ptr [rdi + 0x18], r12",
    "mov qword ptr [rdi + 0x20], r13",
    "mov qword ptr [rdi + 0x28], r14",
    "mov qword ptr [rdi + 0x30], r15",
    "stmxcsr dword ptr [rdi + 0x38]",
    "fnstcw word ptr [rdi + 0x3c]",
    "mov rsp, qword ptr [rsi + 0x00]",
    "mov rbp, qword ptr [rsi + 0x08]",
    "mov rbx, qword ptr [rsi + 0x10]",
    "mov r12, qword ptr [rsi + 0x18]",
    "mov r13, qword ptr [rsi + 0x20]",
    "mov r14, qword ptr [rsi + 0x28]",
    "mov r15, qword ptr [rsi + 0x30]",
    "ldmxcsr dword ptr [rsi + 0x38]",
    "fldcw word ptr [rsi + 0x3c]",
    "ret",
);

#[cfg(target_arch = "x86_64")]
impl Registers {
    /// Checkpoint that starts `entry` on an empty stack ending at `top`
    ///
    /// # Safety
    /// `top` must be 16-byte aligned with at least 16 writable bytes below it.
    pub(crate) unsafe fn fresh(top: *mut u8, entry: EntryFn) -> Self {
        // [top-8]: null return address, ends backtraces
        // [top-16]: popped by the switch's `ret`, leaving rsp ≡ 8 (mod 16) at entry
        let slots = top.cast::<u64>();
        slots.sub(1).write(0);
        slots.sub(2).write(entry as usize as u64);
        Self {
            rsp: slots.sub(2) as u64,
            mxcsr: 0x1F80,
            fpu_cw: 0x037F,
            ..Self::default()
        }
    }

    /// Saved stack pointer
    #[inline]
    pub(crate) fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }
}

// -----------------------------------------------------------------------------
// AArch64 AAPCS64
// -----------------------------------------------------------------------------

/// Callee-saved register file
#[cfg(target_arch = "aarch64")]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Registers {
    x19_x28: [u64; 10],
    fp: u64,
    lr: u64,
    sp: u64,
    d8_d15: [u64; 8],
}

#[cfg(target_arch = "aarch64")]
global_function!(
    "procsim_switch_context",
    "stp x19, x20, [x0, #0]",
    "stp x21, x22, [x0, #16]",
    "stp x23, x24, [x0, #32]",
    "stp x25, x26, [x0, #48]",
    "stp x27, x28, [x0, #64]",
    "stp x29, x30, [x0, #80]",
    "mov x9, sp",
    "str x9, [x0, #96]",
    "stp d8, d9, [x0, #104]",
    "stp d10, d11, [x0, #120]",
    "stp d12, d13, [x0, #136]",
    "stp d14, d15, [x0, #152]",
    "ldp x19, x20, [x1, #0]",
    "ldp x21, x22, [x1, #16]",
    "ldp x23, x24, [x1, #32]",
    "ldp x25, x26, [x1, #48]",
    "ldp x27, x28, [x1, #64]",
    "ldp x29, x30, [x1, #80]",
    "ldr x9, [x1, #96]",
    "mov sp, x9",
    "ldp d8, d9, [x1, #104]",
    "ldp d10, d11, [x1, #120]",
    "ldp d12, d13, [x1, #136]",
    "ldp d14, d15, [x1, #152]",
    "ret",
);

// First switch lands here: clear fp/lr so unwinders stop, then enter via x19
#[cfg(target_arch = "aarch64")]
global_function!(
    "procsim_context_entry",
    "mov x29, xzr",
    "mov x30, xzr",
    "br x19",
);

#[cfg(target_arch = "aarch64")]
extern "C" {
    fn procsim_context_entry();
}

#[cfg(target_arch = "aarch64")]
impl Registers {
    /// Checkpoint that starts `entry` on an empty stack ending at `top`
    ///
    /// # Safety
    /// `top` must be 16-byte aligned.
    pub(crate) unsafe fn fresh(top: *mut u8, entry: EntryFn) -> Self {
        let mut regs = Self::default();
        regs.x19_x28[0] = entry as usize as u64;
        regs.lr = procsim_context_entry as usize as u64;
        regs.sp = top as u64;
        regs
    }

    /// Saved stack pointer
    #[inline]
    pub(crate) fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/*!
 * Saved Context
 *
 * Byte-exact image of the dispatch-stack region a process occupied when it
 * suspended, plus the checkpoint to continue from. Owned by exactly one
 * process; consumed by `restore`.
 */

use super::arch::Registers;
use super::fatal;
use super::stack::DispatchStack;
use std::mem::MaybeUninit;
use std::ptr;

/// Suspended call stack of one process
pub struct SavedContext {
    // stack bytes may include padding, so they are copied as MaybeUninit
    image: Box<[MaybeUninit<u8>]>,
    checkpoint: Registers,
}

impl SavedContext {
    /// Copy the live region `[checkpoint.sp, top)` of a frozen stack
    ///
    /// # Safety
    /// The process that produced `checkpoint` must have switched away from
    /// `stack` and nothing may have run on `stack` since.
    pub(crate) unsafe fn capture(stack: &DispatchStack, checkpoint: Registers) -> Self {
        let sp = checkpoint.stack_pointer();
        if !stack.contains(sp) {
            fatal("suspended stack pointer outside the dispatch stack");
        }
        let top = stack.top() as usize;
        let len = top - sp;

        let mut image: Vec<MaybeUninit<u8>> = Vec::with_capacity(len);
        ptr::copy_nonoverlapping(sp as *const MaybeUninit<u8>, image.as_mut_ptr(), len);
        image.set_len(len);

        Self {
            image: image.into_boxed_slice(),
            checkpoint,
        }
    }

    /// Copy the image back below `top` and hand out the checkpoint
    ///
    /// The image buffer is released here; the returned registers are all
    /// that is needed to continue.
    ///
    /// # Safety
    /// Must run on a stack disjoint from `stack`, with no process occupying
    /// `stack`, and `stack` must be the one this image was captured from.
    pub(crate) unsafe fn restore(self, stack: &DispatchStack) -> Registers {
        let len = self.image.len();
        if len > stack.capacity() {
            fatal("saved image larger than the dispatch stack");
        }
        let dst = stack.top().sub(len);
        ptr::copy_nonoverlapping(self.image.as_ptr(), dst.cast::<MaybeUninit<u8>>(), len);
        self.checkpoint
    }

    /// Size of the saved image in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// Whether the image is empty (never true for a captured context)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

impl std::fmt::Debug for SavedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedContext")
            .field("bytes", &self.image.len())
            .finish()
    }
}

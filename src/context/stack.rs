/*!
 * Dispatch Stack
 *
 * The single memory region every process of a simulation executes on.
 * Only one process occupies it at a time; the others live as byte images
 * in their saved contexts.
 *
 * The mapping comes from `context::stack::ProtectedFixedSizeStack`, which
 * puts an inaccessible page below it. A painted zone at the low end of the
 * mapping catches smaller overruns once control is back in the dispatcher.
 *
 * Layout (stack grows down):
 *
 * ```text
 *   top    +-----------------+  <- 16-byte aligned, base of every image
 *          |  live frames    |
 *          |      ...        |
 *          +-----------------+  <- saved sp of the running/suspended process
 *          |  free           |
 *   limit  +-----------------+
 *          |  guard zone     |  painted with GUARD_PATTERN
 *   bottom +-----------------+
 *          |  protected page |  PROT_NONE, faults on access
 *          +-----------------+
 * ```
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{GUARD_PATTERN, STACK_ALIGN};
use ::context::stack::ProtectedFixedSizeStack;

/// Guard-paged mapping used as the shared execution stack
pub(crate) struct DispatchStack {
    stack: ProtectedFixedSizeStack,
    guard: usize,
}

impl DispatchStack {
    /// Map a stack of at least `size` bytes with a `guard`-byte sentinel zone
    ///
    /// The page below the mapping is protected, so an overflow past the
    /// painted zone faults instead of writing into foreign memory.
    pub(crate) fn new(size: usize, guard: usize) -> Result<Self, ConfigError> {
        let stack = ProtectedFixedSizeStack::new(size).map_err(|e| {
            ConfigError::StackAllocation(format!("{} bytes: {}", size, e).into())
        })?;
        let dispatch = Self { stack, guard };
        if dispatch.top() as usize % STACK_ALIGN != 0 {
            return Err(ConfigError::StackAllocation(
                format!("stack top {:p} is not {}-byte aligned", dispatch.top(), STACK_ALIGN).into(),
            ));
        }
        if dispatch.size() <= guard {
            return Err(ConfigError::StackAllocation(
                format!("{} byte stack leaves no room above the guard zone", dispatch.size()).into(),
            ));
        }
        dispatch.paint_guard();
        Ok(dispatch)
    }

    /// Highest address; the base of every captured image
    #[inline]
    pub(crate) fn top(&self) -> *mut u8 {
        self.stack.top().cast::<u8>()
    }

    /// Lowest writable address, right above the protected page
    #[inline]
    fn bottom(&self) -> *mut u8 {
        self.stack.bottom().cast::<u8>()
    }

    /// Mapped bytes between bottom and top
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.top() as usize - self.bottom() as usize
    }

    /// Lowest address a live frame may reach
    #[inline]
    pub(crate) fn limit(&self) -> usize {
        self.bottom() as usize + self.guard
    }

    /// Usable bytes above the guard zone
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.size() - self.guard
    }

    /// Whether `sp` lies in the usable part of this stack
    #[inline]
    pub(crate) fn contains(&self, sp: usize) -> bool {
        sp >= self.limit() && sp <= self.top() as usize
    }

    /// Verify the painted zone is untouched
    pub(crate) fn check_guard(&self) -> bool {
        let words = self.guard / std::mem::size_of::<u64>();
        let zone = self.bottom().cast::<u64>();
        // SAFETY: zone lies inside the mapping, page aligned
        (0..words).all(|i| unsafe { zone.add(i).read_volatile() } == GUARD_PATTERN)
    }

    fn paint_guard(&self) {
        let words = self.guard / std::mem::size_of::<u64>();
        let zone = self.bottom().cast::<u64>();
        for i in 0..words {
            // SAFETY: zone lies inside the mapping, page aligned
            unsafe { zone.add(i).write_volatile(GUARD_PATTERN) };
        }
    }
}

impl std::fmt::Debug for DispatchStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchStack")
            .field("top", &self.top())
            .field("size", &self.size())
            .field("guard", &self.guard)
            .finish()
    }
}

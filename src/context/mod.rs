/*!
 * Execution-Context Store
 *
 * Pure mechanism: a shared dispatch stack, CPU checkpoints, and byte images
 * of suspended stacks. Knows nothing about simulation semantics.
 *
 * Ordering contract used by the dispatcher:
 * 1. capture only after the process has switched away from the stack
 * 2. restore (copy back) only from a stack disjoint from the dispatch stack
 * 3. jump only after the copy is complete
 */

pub(crate) mod arch;
pub(crate) mod stack;
mod saved;

pub use saved::SavedContext;

/// Abort on a failed integrity check of a saved or restored stack
#[cold]
pub(crate) fn fatal(msg: &str) -> ! {
    tracing::error!(reason = msg, "context switch integrity failure, aborting");
    eprintln!("procsim: fatal: {}", msg);
    std::process::abort()
}

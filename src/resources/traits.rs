/*!
 * Resource Traits
 * Seams between processes and the resources they contend for
 */

use crate::core::types::{Name, ServicePriority, SimResult};
use crate::process::Process;

/// Waiting line that tracks membership on the process itself
///
/// Implementations call `Process::mark_queued` on insert and
/// `Process::clear_queued` on removal, so a process is in at most one queue.
pub trait ProcessQueue: std::fmt::Debug {
    fn name(&self) -> Name;

    /// Append `process` behind entries of equal or higher rank
    fn insert(&self, process: &Process);

    /// Take `process` out; returns whether it was present
    fn remove(&self, process: &Process) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive single-holder resource
pub trait SeizeRelease {
    /// Take the resource, waiting while another process holds it
    fn seize(&self, process: &Process, service_priority: ServicePriority) -> SimResult<()>;

    /// Give the resource back, handing it to the first waiter
    fn release(&self, process: &Process) -> SimResult<()>;
}

/// Resource with a number of interchangeable units
pub trait EnterLeave {
    /// Take `amount` units, waiting until they are free
    fn enter(&self, process: &Process, amount: u64) -> SimResult<()>;

    /// Return `amount` units, admitting waiters that now fit
    fn leave(&self, process: &Process, amount: u64) -> SimResult<()>;
}

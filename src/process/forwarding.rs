/*!
 * Resource Forwarding
 * Process-side shorthands for facility, store and queue operations
 */

use super::handle::Process;
use crate::core::errors::ResourceError;
use crate::core::types::{ServicePriority, SimResult};
use crate::resources::{EnterLeave, Queue, SeizeRelease};

impl Process {
    /// Acquire `facility`, waiting in its queue if busy
    #[inline]
    pub fn seize(&self, facility: &dyn SeizeRelease, service_priority: ServicePriority) -> SimResult<()> {
        facility.seize(self, service_priority)
    }

    /// Give `facility` back
    #[inline]
    pub fn release(&self, facility: &dyn SeizeRelease) -> SimResult<()> {
        facility.release(self)
    }

    /// Take `amount` units of `store`, waiting until they are free
    #[inline]
    pub fn enter(&self, store: &dyn EnterLeave, amount: u64) -> SimResult<()> {
        store.enter(self, amount)
    }

    /// Return `amount` units to `store`
    #[inline]
    pub fn leave(&self, store: &dyn EnterLeave, amount: u64) -> SimResult<()> {
        store.leave(self, amount)
    }

    /// Join `queue` (Into), leaving any queue this process already waits in
    pub fn into_queue(&self, queue: &Queue) -> SimResult<()> {
        self.ensure_alive()?;
        queue.insert(self);
        Ok(())
    }

    /// Leave the queue this process waits in (Out)
    pub fn out_of_queue(&self) -> SimResult<()> {
        let Some(queue) = self.queue() else {
            return Err(ResourceError::NotQueued {
                queue: "<none>".into(),
                process: self.name(),
            }
            .into());
        };
        if queue.remove(self) {
            Ok(())
        } else {
            Err(ResourceError::NotQueued {
                queue: queue.name(),
                process: self.name(),
            }
            .into())
        }
    }
}

/*!
 * Facility
 *
 * Single-server resource. Waiters are served by service priority, then
 * by process priority, then in arrival order. Release hands the facility
 * straight to the first waiter and activates it at the current time.
 */

use super::queue::Queue;
use super::traits::SeizeRelease;
use crate::core::errors::{ProcessError, ResourceError};
use crate::core::types::{Name, ServicePriority, SimResult};
use crate::process::Process;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

struct FacilityState {
    name: Name,
    holder: RefCell<Option<Process>>,
    queue: Queue,
}

/// Shared handle to a single-server resource
#[derive(Clone)]
pub struct Facility {
    inner: Rc<FacilityState>,
}

impl Facility {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name: Name = name.as_ref().into();
        let queue = Queue::new(format!("{}.queue", name));
        Self {
            inner: Rc::new(FacilityState {
                name,
                holder: RefCell::new(None),
                queue,
            }),
        }
    }

    pub fn name(&self) -> Name {
        self.inner.name.clone()
    }

    /// Whether some process holds the facility
    pub fn is_busy(&self) -> bool {
        self.inner.holder.borrow().is_some()
    }

    pub fn holder(&self) -> Option<Process> {
        self.inner.holder.borrow().clone()
    }

    /// Processes waiting for the facility
    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    fn is_held_by(&self, process: &Process) -> bool {
        self.inner
            .holder
            .borrow()
            .as_ref()
            .is_some_and(|h| h.id() == process.id())
    }

    fn not_holder(&self, process: &Process) -> ResourceError {
        ResourceError::NotHolder {
            facility: self.name(),
            process: process.name(),
        }
    }
}

impl SeizeRelease for Facility {
    fn seize(&self, process: &Process, service_priority: ServicePriority) -> SimResult<()> {
        if process.is_terminated() {
            return Err(ProcessError::Terminated(process.id()).into());
        }
        if !process.is_current() {
            return Err(ProcessError::NotCurrent(process.id()).into());
        }
        if self.is_held_by(process) {
            warn!(facility = %self.inner.name, pid = process.id(), "facility seized twice by its holder");
            return Ok(());
        }
        if !self.is_busy() {
            *self.inner.holder.borrow_mut() = Some(process.clone());
            debug!(facility = %self.inner.name, pid = process.id(), "facility seized");
            return Ok(());
        }

        self.inner
            .queue
            .insert_ranked(process, (service_priority, process.priority()));
        debug!(
            facility = %self.inner.name,
            pid = process.id(),
            waiting = self.inner.queue.len(),
            "facility busy, waiting"
        );
        process.passivate()?;

        if self.is_held_by(process) {
            Ok(())
        } else {
            self.inner.queue.remove(process);
            Err(self.not_holder(process).into())
        }
    }

    fn release(&self, process: &Process) -> SimResult<()> {
        if !self.is_held_by(process) {
            return Err(self.not_holder(process).into());
        }
        let next = self.inner.queue.pop_front();
        *self.inner.holder.borrow_mut() = next.clone();
        debug!(facility = %self.inner.name, pid = process.id(), "facility released");
        if let Some(next) = next {
            debug!(facility = %self.inner.name, pid = next.id(), "facility handed over");
            next.activate()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facility")
            .field("name", &self.inner.name)
            .field("holder", &self.holder().map(|p| p.id()))
            .field("waiting", &self.inner.queue.len())
            .finish()
    }
}

/*!
 * Store
 *
 * Resource of `capacity` interchangeable units. A request that does not
 * fit waits in the store queue; every `leave` admits the waiting requests
 * that now fit, in queue order.
 */

use super::queue::Queue;
use super::traits::EnterLeave;
use crate::core::errors::{ProcessError, ResourceError};
use crate::core::types::{Name, ProcessId, SimResult};
use crate::process::Process;
use ahash::AHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

struct StoreState {
    name: Name,
    capacity: u64,
    used: Cell<u64>,
    queue: Queue,
    // pending requests of the processes in `queue`
    requests: RefCell<AHashMap<ProcessId, u64>>,
}

/// Shared handle to a multi-unit resource
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreState>,
}

impl Store {
    pub fn new(name: impl AsRef<str>, capacity: u64) -> Self {
        let name: Name = name.as_ref().into();
        let queue = Queue::new(format!("{}.queue", name));
        Self {
            inner: Rc::new(StoreState {
                name,
                capacity,
                used: Cell::new(0),
                queue,
                requests: RefCell::new(AHashMap::new()),
            }),
        }
    }

    pub fn name(&self) -> Name {
        self.inner.name.clone()
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.inner.capacity
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.inner.used.get()
    }

    #[inline]
    pub fn free(&self) -> u64 {
        self.inner.capacity - self.inner.used.get()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Processes waiting for units
    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    /// Admit waiting requests that fit, in queue order
    fn admit_waiting(&self) -> SimResult<()> {
        for waiter in self.inner.queue.processes() {
            let requested = match self.inner.requests.borrow().get(&waiter.id()) {
                Some(&requested) => requested,
                None => continue,
            };
            if requested > self.free() {
                continue;
            }
            self.inner.queue.remove(&waiter);
            self.inner.requests.borrow_mut().remove(&waiter.id());
            self.inner.used.set(self.used() + requested);
            debug!(store = %self.inner.name, pid = waiter.id(), requested, "waiting request admitted");
            waiter.activate()?;
        }
        Ok(())
    }
}

impl EnterLeave for Store {
    fn enter(&self, process: &Process, amount: u64) -> SimResult<()> {
        if process.is_terminated() {
            return Err(ProcessError::Terminated(process.id()).into());
        }
        if amount > self.capacity() {
            return Err(ResourceError::CapacityExceeded {
                store: self.name(),
                requested: amount,
                capacity: self.capacity(),
            }
            .into());
        }
        if amount <= self.free() {
            self.inner.used.set(self.used() + amount);
            debug!(store = %self.inner.name, pid = process.id(), amount, used = self.used(), "store entered");
            return Ok(());
        }
        if !process.is_current() {
            return Err(ProcessError::NotCurrent(process.id()).into());
        }

        self.inner.requests.borrow_mut().insert(process.id(), amount);
        self.inner.queue.insert(process);
        debug!(store = %self.inner.name, pid = process.id(), amount, free = self.free(), "store full, waiting");
        process.passivate()?;

        let pending = self.inner.requests.borrow_mut().remove(&process.id());
        if pending.is_none() {
            Ok(())
        } else {
            self.inner.queue.remove(process);
            Err(ResourceError::NotAdmitted {
                store: self.name(),
                process: process.name(),
            }
            .into())
        }
    }

    fn leave(&self, process: &Process, amount: u64) -> SimResult<()> {
        if amount > self.used() {
            return Err(ResourceError::LeaveUnderflow {
                store: self.name(),
                requested: amount,
                used: self.used(),
            }
            .into());
        }
        self.inner.used.set(self.used() - amount);
        debug!(store = %self.inner.name, pid = process.id(), amount, used = self.used(), "store left");
        self.admit_waiting()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("used", &self.used())
            .field("waiting", &self.inner.queue.len())
            .finish()
    }
}

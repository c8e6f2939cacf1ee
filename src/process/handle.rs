/*!
 * Process Handles
 *
 * `Process` is a strong, cloneable handle. Engine-owned processes are handed
 * out as `ProcessRef`, which never keeps the process alive: the simulation
 * drops its reference the moment the process terminates.
 */

use super::dispatcher;
use super::types::{Behavior, Ownership, ProcessStatus};
use crate::context::SavedContext;
use crate::core::errors::ProcessError;
use crate::core::types::{Name, Priority, ProcessId, SimResult, SimTime};
use crate::resources::ProcessQueue;
use crate::scheduler::kernel::Kernel;
use crate::scheduler::SimHandle;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) struct ProcessInner {
    id: ProcessId,
    name: Option<Name>,
    priority: Cell<Priority>,
    status: Cell<ProcessStatus>,
    ownership: Ownership,
    context: RefCell<Option<SavedContext>>,
    behavior: RefCell<Option<Behavior>>,
    queue: RefCell<Option<Weak<dyn ProcessQueue>>>,
    waiting_until: Cell<bool>,
    kernel: Weak<Kernel>,
}

/// Strong handle to a simulated process
#[derive(Clone)]
pub struct Process {
    inner: Rc<ProcessInner>,
}

/// Non-owning handle to a process
#[derive(Clone)]
pub struct ProcessRef {
    id: ProcessId,
    inner: Weak<ProcessInner>,
}

impl Process {
    pub(crate) fn new(
        id: ProcessId,
        name: Option<Name>,
        priority: Priority,
        ownership: Ownership,
        behavior: Behavior,
        kernel: Weak<Kernel>,
    ) -> Self {
        Self {
            inner: Rc::new(ProcessInner {
                id,
                name,
                priority: Cell::new(priority),
                status: Cell::new(ProcessStatus::Prepared),
                ownership,
                context: RefCell::new(None),
                behavior: RefCell::new(Some(behavior)),
                queue: RefCell::new(None),
                waiting_until: Cell::new(false),
                kernel,
            }),
        }
    }

    /// Stable identity
    #[inline]
    pub fn id(&self) -> ProcessId {
        self.inner.id
    }

    /// Explicit name, or `Process#<id>`
    pub fn name(&self) -> Name {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => format!("Process#{}", self.inner.id).into(),
        }
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.inner.priority.get()
    }

    /// Change the scheduling priority; pending calendar entries keep their old rank
    #[inline]
    pub fn set_priority(&self, priority: Priority) {
        self.inner.priority.set(priority);
    }

    #[inline]
    pub fn status(&self) -> ProcessStatus {
        self.inner.status.get()
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.inner.ownership
    }

    #[inline(always)]
    pub fn is_terminated(&self) -> bool {
        self.status() == ProcessStatus::Terminated
    }

    /// Whether this process is the one executing right now
    pub fn is_current(&self) -> bool {
        dispatcher::current_process_id() == Some(self.id())
    }

    /// Not scheduled in the calendar
    pub fn is_idle(&self) -> bool {
        match self.inner.kernel.upgrade() {
            Some(kernel) => !kernel.calendar().is_scheduled(self),
            None => true,
        }
    }

    /// Neither scheduled nor waiting in a queue, and not terminated
    pub fn is_passive(&self) -> bool {
        !self.is_terminated() && self.is_idle() && self.queue().is_none()
    }

    /// Whether a saved context is held (true exactly when Interrupted)
    pub fn has_context(&self) -> bool {
        self.inner.context.borrow().is_some()
    }

    /// Size of the saved stack image, if suspended
    pub fn context_size(&self) -> Option<usize> {
        self.inner.context.borrow().as_ref().map(SavedContext::len)
    }

    /// Queue this process is waiting in
    pub fn queue(&self) -> Option<Rc<dyn ProcessQueue>> {
        self.inner.queue.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Pending activation time, if scheduled
    pub fn activation_time(&self) -> Option<SimTime> {
        let kernel = self.inner.kernel.upgrade()?;
        let time = kernel.calendar().activation_time(self);
        time
    }

    /// Current simulated time
    pub fn now(&self) -> SimResult<SimTime> {
        Ok(self.kernel()?.now())
    }

    /// Handle to the owning simulation
    pub fn sim(&self) -> SimHandle {
        SimHandle::from_weak(self.inner.kernel.clone())
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> ProcessRef {
        ProcessRef {
            id: self.id(),
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Identity comparison
    #[inline]
    pub fn ptr_eq(&self, other: &Process) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Record membership in `queue`; for `ProcessQueue` implementations
    pub fn mark_queued(&self, queue: Weak<dyn ProcessQueue>) {
        *self.inner.queue.borrow_mut() = Some(queue);
    }

    /// Forget queue membership; for `ProcessQueue` implementations
    pub fn clear_queued(&self) {
        self.inner.queue.borrow_mut().take();
    }

    // -------------------------------------------------------------------------
    // crate-internal state access
    // -------------------------------------------------------------------------

    pub(crate) fn kernel(&self) -> SimResult<Rc<Kernel>> {
        self.inner
            .kernel
            .upgrade()
            .ok_or_else(|| ProcessError::Detached(self.id()).into())
    }

    pub(crate) fn weak_kernel(&self) -> &Weak<Kernel> {
        &self.inner.kernel
    }

    pub(crate) fn ensure_alive(&self) -> SimResult<()> {
        if self.is_terminated() {
            return Err(ProcessError::Terminated(self.id()).into());
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn set_status(&self, status: ProcessStatus) {
        self.inner.status.set(status);
    }

    pub(crate) fn take_context(&self) -> Option<SavedContext> {
        self.inner.context.borrow_mut().take()
    }

    pub(crate) fn store_context(&self, context: SavedContext) {
        *self.inner.context.borrow_mut() = Some(context);
    }

    pub(crate) fn take_behavior(&self) -> Option<Behavior> {
        self.inner.behavior.borrow_mut().take()
    }

    #[inline]
    pub(crate) fn is_waiting_until(&self) -> bool {
        self.inner.waiting_until.get()
    }

    #[inline]
    pub(crate) fn set_waiting_until(&self, waiting: bool) {
        self.inner.waiting_until.set(waiting);
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("priority", &self.priority())
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl PartialEq for Process {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Process {}

impl ProcessRef {
    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Strong handle, unless the process has already been released
    pub fn upgrade(&self) -> Option<Process> {
        self.inner.upgrade().map(|inner| Process { inner })
    }

    /// Whether the process still exists
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Status; a released process reports Terminated
    pub fn status(&self) -> ProcessStatus {
        self.upgrade()
            .map(|p| p.status())
            .unwrap_or(ProcessStatus::Terminated)
    }

    /// Schedule the process at the current time
    pub fn activate(&self) -> SimResult<()> {
        self.live()?.activate()
    }

    /// Schedule the process at `time`
    pub fn activate_at(&self, time: SimTime) -> SimResult<()> {
        self.live()?.activate_at(time)
    }

    /// Kill the process
    pub fn terminate(&self) -> SimResult<()> {
        match self.upgrade() {
            Some(process) => process.terminate(),
            None => Ok(()),
        }
    }

    fn live(&self) -> SimResult<Process> {
        self.upgrade()
            .ok_or_else(|| ProcessError::Terminated(self.id).into())
    }
}

impl fmt::Debug for ProcessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRef")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

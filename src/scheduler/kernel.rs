/*!
 * Simulation Kernel
 *
 * Shared state behind a `Simulation`: clock, calendar, dispatch stack,
 * process registry, wait-until list and the reaper of cancelled stacks.
 * The dispatcher itself lives in `process::dispatcher` as an extra impl
 * block on `Kernel`.
 */

use super::traits::Calendar;
use crate::context::stack::DispatchStack;
use crate::context::SavedContext;
use crate::core::config::EngineConfig;
use crate::core::errors::ProcessError;
use crate::core::types::{ProcessId, SimResult, SimTime};
use crate::monitoring::DispatchStats;
use crate::process::{is_active, Ownership, Process, ProcessRef, ProcessStatus};
use ahash::AHashMap;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use tracing::{debug, info, warn};

/// How the kernel keeps a registered process
enum Slot {
    Owned(Process),
    Borrowed(ProcessRef),
}

impl Slot {
    fn process(&self) -> Option<Process> {
        match self {
            Slot::Owned(process) => Some(process.clone()),
            Slot::Borrowed(weak) => weak.upgrade(),
        }
    }
}

pub(crate) struct Kernel {
    pub(crate) config: EngineConfig,
    pub(crate) stack: DispatchStack,
    pub(crate) stats: RefCell<DispatchStats>,
    pub(crate) reaper: RefCell<Vec<(Process, SavedContext)>>,
    clock: Cell<SimTime>,
    horizon: Cell<SimTime>,
    stopped: Cell<bool>,
    calendar: RefCell<Box<dyn Calendar>>,
    registry: RefCell<AHashMap<ProcessId, Slot>>,
    waiting: RefCell<Vec<ProcessRef>>,
}

impl Kernel {
    pub(crate) fn new(config: EngineConfig, calendar: Box<dyn Calendar>) -> SimResult<Self> {
        config.validate()?;
        let stack = DispatchStack::new(config.dispatch_stack_size, config.guard_size)?;
        debug!(
            stack_size = config.dispatch_stack_size,
            guard_size = config.guard_size,
            "kernel created"
        );
        Ok(Self {
            config,
            stack,
            stats: RefCell::new(DispatchStats::default()),
            reaper: RefCell::new(Vec::new()),
            clock: Cell::new(0.0),
            horizon: Cell::new(SimTime::INFINITY),
            stopped: Cell::new(false),
            calendar: RefCell::new(calendar),
            registry: RefCell::new(AHashMap::new()),
            waiting: RefCell::new(Vec::new()),
        })
    }

    // -------------------------------------------------------------------------
    // clock
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn now(&self) -> SimTime {
        self.clock.get()
    }

    #[inline]
    pub(crate) fn horizon(&self) -> SimTime {
        self.horizon.get()
    }

    pub(crate) fn init(&self, start: SimTime, end: SimTime) -> SimResult<()> {
        if !start.is_finite() {
            return Err(ProcessError::InvalidTime { time: start }.into());
        }
        if end.is_nan() || end < start {
            return Err(ProcessError::InvalidTime { time: end }.into());
        }
        self.clock.set(start);
        self.horizon.set(end);
        self.stopped.set(false);
        info!(start, end, "simulation initialized");
        Ok(())
    }

    pub(crate) fn stop(&self) {
        self.stopped.set(true);
    }

    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub(crate) fn reset_stop(&self) {
        self.stopped.set(false);
    }

    pub(crate) fn advance_to(&self, time: SimTime) {
        if time > self.clock.get() {
            self.clock.set(time);
        }
    }

    // -------------------------------------------------------------------------
    // calendar
    // -------------------------------------------------------------------------

    pub(crate) fn calendar(&self) -> Ref<'_, dyn Calendar + 'static> {
        Ref::map(self.calendar.borrow(), |c| &**c)
    }

    pub(crate) fn calendar_mut(&self) -> RefMut<'_, dyn Calendar + 'static> {
        RefMut::map(self.calendar.borrow_mut(), |c| &mut **c)
    }

    /// Put `process` on the calendar at `time`
    ///
    /// A process waiting in a queue is taken out of it first.
    pub(crate) fn schedule(&self, process: &Process, time: SimTime) -> SimResult<()> {
        if time.is_nan() {
            return Err(ProcessError::InvalidTime { time }.into());
        }
        let now = self.now();
        if time < now {
            return Err(ProcessError::ScheduleInPast { time, now }.into());
        }
        if process.is_terminated() {
            return Err(ProcessError::Terminated(process.id()).into());
        }
        if let Some(queue) = process.queue() {
            warn!(
                pid = process.id(),
                queue = %queue.name(),
                "activating a queued process, removing it from its queue"
            );
            queue.remove(process);
        }
        self.calendar_mut().schedule_at(process, time);
        Ok(())
    }

    pub(crate) fn unschedule(&self, process: &Process) -> bool {
        self.calendar_mut().unschedule(process)
    }

    pub(crate) fn next_time(&self) -> Option<SimTime> {
        self.calendar_mut().peek_time()
    }

    // -------------------------------------------------------------------------
    // registry
    // -------------------------------------------------------------------------

    pub(crate) fn register(&self, process: &Process) {
        let slot = match process.ownership() {
            Ownership::Engine => Slot::Owned(process.clone()),
            Ownership::Caller => Slot::Borrowed(process.downgrade()),
        };
        self.registry.borrow_mut().insert(process.id(), slot);
    }

    /// Processes not yet terminated
    pub(crate) fn live_processes(&self) -> Vec<Process> {
        let mut live: Vec<Process> = self
            .registry
            .borrow()
            .values()
            .filter_map(Slot::process)
            .filter(|p| !p.is_terminated())
            .collect();
        live.sort_by_key(Process::id);
        live
    }

    // -------------------------------------------------------------------------
    // wait-until list
    // -------------------------------------------------------------------------

    pub(crate) fn start_waiting(&self, process: &Process) {
        let mut waiting = self.waiting.borrow_mut();
        if !waiting.iter().any(|w| w.id() == process.id()) {
            waiting.push(process.downgrade());
        }
        process.set_waiting_until(true);
    }

    pub(crate) fn stop_waiting(&self, process: &Process) {
        self.waiting.borrow_mut().retain(|w| w.id() != process.id());
        process.set_waiting_until(false);
    }

    /// Activate every wait-until process at the current time to re-test
    pub(crate) fn wake_waiters(&self) -> SimResult<()> {
        let waiters: Vec<ProcessRef> = self.waiting.borrow_mut().drain(..).collect();
        let now = self.now();
        for waiter in waiters {
            if let Some(process) = waiter.upgrade() {
                if !process.is_terminated() {
                    self.schedule(&process, now)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn waiting_len(&self) -> usize {
        self.waiting.borrow().len()
    }

    // -------------------------------------------------------------------------
    // termination
    // -------------------------------------------------------------------------

    /// Remove `process` from its queue, the calendar and the wait-until list
    pub(crate) fn detach(&self, process: &Process) {
        if let Some(queue) = process.queue() {
            queue.remove(process);
        }
        self.unschedule(process);
        self.stop_waiting(process);
    }

    /// Make `process` Terminated and release everything the engine holds for it
    pub(crate) fn finalize(&self, process: &Process) {
        process.set_status(ProcessStatus::Terminated);
        self.detach(process);
        drop(process.take_context());
        drop(process.take_behavior());
        let slot = self.registry.borrow_mut().remove(&process.id());
        drop(slot);
        self.stats.borrow_mut().terminations += 1;
        debug!(pid = process.id(), name = %process.name(), "process terminated");
    }

    /// Terminate a process that is not running
    pub(crate) fn terminate_other(&self, process: &Process) {
        let context = process.take_context();
        self.finalize(process);
        if let Some(context) = context {
            self.reaper.borrow_mut().push((process.clone(), context));
            self.drain_reaper();
        }
    }

    /// Terminate and unwind every live process
    pub(crate) fn shutdown(&self) {
        if is_active() {
            warn!("shutdown requested during a dispatch, deferring");
            return;
        }
        let live = self.live_processes();
        if !live.is_empty() {
            info!(count = live.len(), "shutting down live processes");
        }
        for process in live {
            self.terminate_other(&process);
        }
        self.drain_reaper();
        self.calendar_mut().clear();
        self.waiting.borrow_mut().clear();
        self.registry.borrow_mut().clear();
    }

    pub(crate) fn stats(&self) -> DispatchStats {
        self.stats.borrow().clone()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("now", &self.now())
            .field("horizon", &self.horizon())
            .field("scheduled", &self.calendar.borrow().len())
            .field("registered", &self.registry.borrow().len())
            .field("stack", &self.stack)
            .finish()
    }
}

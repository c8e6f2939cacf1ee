/*!
 * Simulation
 *
 * Owning handle over a kernel plus the run loop that drives the calendar.
 * Behaviors reach their simulation through a weak `SimHandle`, so a
 * suspended process never keeps the simulation alive.
 */

use super::calendar::EventCalendar;
use super::kernel::Kernel;
use super::traits::Calendar;
use crate::core::config::EngineConfig;
use crate::core::errors::ProcessError;
use crate::core::types::{next_process_id, Name, Priority, SimResult, SimTime};
use crate::monitoring::DispatchStats;
use crate::process::{current_process_id, is_active, Ownership, Process, ProcessRef, ProcessStatus};
use std::rc::{Rc, Weak};
use tracing::{debug, info};

/// A discrete-event simulation
///
/// Dropping it terminates every process still alive and unwinds their
/// suspended stacks.
#[derive(Debug)]
pub struct Simulation {
    kernel: Rc<Kernel>,
}

/// Builder for `Simulation`
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    config: EngineConfig,
    calendar: Option<Box<dyn Calendar>>,
}

impl SimulationBuilder {
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default `EventCalendar`
    #[inline]
    #[must_use]
    pub fn with_calendar(mut self, calendar: Box<dyn Calendar>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn build(self) -> SimResult<Simulation> {
        let calendar = self
            .calendar
            .unwrap_or_else(|| Box::new(EventCalendar::new()));
        let kernel = Kernel::new(self.config, calendar)?;
        Ok(Simulation {
            kernel: Rc::new(kernel),
        })
    }
}

impl Simulation {
    /// Simulation with the default configuration
    pub fn new() -> SimResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::default()
    }

    /// Set the clock to `start` and the run horizon to `end` (may be infinite)
    pub fn init(&self, start: SimTime, end: SimTime) -> SimResult<()> {
        self.kernel.init(start, end)
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    #[inline]
    pub fn horizon(&self) -> SimTime {
        self.kernel.horizon()
    }

    /// Weak handle for use inside behaviors
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            kernel: Rc::downgrade(&self.kernel),
        }
    }

    /// Start describing a new process
    pub fn process(&self, name: impl AsRef<str>) -> ProcessBuilder {
        self.handle().process(name)
    }

    /// Spawn an unnamed engine-owned process scheduled at the current time
    pub fn spawn<F>(&self, behavior: F) -> SimResult<ProcessRef>
    where
        F: FnOnce(&Process) -> SimResult<()> + 'static,
    {
        self.handle().spawn(behavior)
    }

    /// Run until the calendar is exhausted, the horizon is reached or `stop` is called
    ///
    /// Returns the simulated time at which the run ended.
    pub fn run(&self) -> SimResult<SimTime> {
        if is_active() {
            return Err(ProcessError::ReentrantDispatch.into());
        }
        let kernel = &self.kernel;
        kernel.reset_stop();
        info!(now = kernel.now(), horizon = kernel.horizon(), "simulation run started");

        while !kernel.is_stopped() {
            if !self.step()? {
                break;
            }
        }

        let end = kernel.horizon();
        if !kernel.is_stopped() && end.is_finite() {
            kernel.advance_to(end);
        }
        let stats = kernel.stats();
        info!(
            now = kernel.now(),
            dispatches = stats.dispatches,
            terminations = stats.terminations,
            "simulation run finished"
        );
        Ok(kernel.now())
    }

    /// Process the next due activation; false when none is left before the horizon
    pub fn step(&self) -> SimResult<bool> {
        if is_active() {
            return Err(ProcessError::ReentrantDispatch.into());
        }
        let kernel = &self.kernel;
        let next = kernel.calendar_mut().pop_next(kernel.horizon());
        let Some((time, process)) = next else {
            return Ok(false);
        };
        kernel.advance_to(time);
        if !process.status().is_dispatchable() {
            debug!(pid = process.id(), status = ?process.status(), "skipping stale activation");
            return Ok(true);
        }

        let dispatched = kernel.dispatch(&process);
        kernel.drain_reaper();
        dispatched?;

        if !process.is_waiting_until() {
            kernel.wake_waiters()?;
        }
        Ok(true)
    }

    /// Stop the run loop after the current dispatch
    pub fn stop(&self) {
        self.kernel.stop();
    }

    /// Dispatch `process` directly, outside the calendar order
    pub fn dispatch(&self, process: &Process) -> SimResult<ProcessStatus> {
        let status = self.kernel.dispatch(process);
        self.kernel.drain_reaper();
        status
    }

    /// Counters of the dispatch machinery
    pub fn stats(&self) -> DispatchStats {
        self.kernel.stats()
    }

    /// Processes registered and not terminated, by id
    pub fn live_processes(&self) -> Vec<Process> {
        self.kernel.live_processes()
    }

    /// Pending calendar entries
    pub fn calendar_len(&self) -> usize {
        self.kernel.calendar().len()
    }

    /// Time of the next pending activation
    pub fn next_time(&self) -> Option<SimTime> {
        self.kernel.next_time()
    }

    /// Processes blocked in `wait_until`
    pub fn waiting_len(&self) -> usize {
        self.kernel.waiting_len()
    }

    /// Terminate every live process and unwind suspended stacks
    pub fn shutdown(&self) {
        self.kernel.shutdown();
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.kernel.shutdown();
    }
}

/// Weak, cloneable handle to a simulation
#[derive(Debug, Clone)]
pub struct SimHandle {
    kernel: Weak<Kernel>,
}

impl SimHandle {
    pub(crate) fn from_weak(kernel: Weak<Kernel>) -> Self {
        Self { kernel }
    }

    fn kernel(&self) -> SimResult<Rc<Kernel>> {
        self.kernel
            .upgrade()
            .ok_or_else(|| ProcessError::Detached(current_process_id().unwrap_or(0)).into())
    }

    /// Whether the simulation still exists
    pub fn is_alive(&self) -> bool {
        self.kernel.strong_count() > 0
    }

    pub fn now(&self) -> SimResult<SimTime> {
        Ok(self.kernel()?.now())
    }

    /// Ask the run loop to stop after the current dispatch
    pub fn stop(&self) -> SimResult<()> {
        self.kernel()?.stop();
        Ok(())
    }

    /// Start describing a new process
    pub fn process(&self, name: impl AsRef<str>) -> ProcessBuilder {
        ProcessBuilder {
            kernel: self.kernel.clone(),
            name: Some(name.as_ref().into()),
            priority: 0,
            start: None,
        }
    }

    /// Spawn an unnamed engine-owned process scheduled at the current time
    pub fn spawn<F>(&self, behavior: F) -> SimResult<ProcessRef>
    where
        F: FnOnce(&Process) -> SimResult<()> + 'static,
    {
        ProcessBuilder {
            kernel: self.kernel.clone(),
            name: None,
            priority: 0,
            start: None,
        }
        .spawn(behavior)
    }
}

/// Describes a process before it is created
#[derive(Debug)]
#[must_use]
pub struct ProcessBuilder {
    kernel: Weak<Kernel>,
    name: Option<Name>,
    priority: Priority,
    start: Option<SimTime>,
}

impl ProcessBuilder {
    #[inline]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// First activation time (default: now for `spawn`, none for `create`)
    #[inline]
    pub fn start_at(mut self, time: SimTime) -> Self {
        self.start = Some(time);
        self
    }

    /// Create an engine-owned process
    ///
    /// The simulation holds it until it terminates; the returned handle
    /// does not keep it alive.
    pub fn spawn<F>(self, behavior: F) -> SimResult<ProcessRef>
    where
        F: FnOnce(&Process) -> SimResult<()> + 'static,
    {
        let kernel = self.upgrade()?;
        let start = self.start.unwrap_or_else(|| kernel.now());
        let process = self.build(&kernel, Ownership::Engine, Box::new(behavior));
        kernel.schedule(&process, start)?;
        kernel.register(&process);
        Ok(process.downgrade())
    }

    /// Create a caller-owned process
    ///
    /// It stays Prepared and passive until activated, unless `start_at`
    /// was given. Dropping every handle to a process that never ran
    /// discards it.
    pub fn create<F>(self, behavior: F) -> SimResult<Process>
    where
        F: FnOnce(&Process) -> SimResult<()> + 'static,
    {
        let kernel = self.upgrade()?;
        let start = self.start;
        let process = self.build(&kernel, Ownership::Caller, Box::new(behavior));
        if let Some(start) = start {
            kernel.schedule(&process, start)?;
        }
        kernel.register(&process);
        Ok(process)
    }

    fn upgrade(&self) -> SimResult<Rc<Kernel>> {
        self.kernel
            .upgrade()
            .ok_or_else(|| ProcessError::Detached(0).into())
    }

    fn build(
        self,
        kernel: &Rc<Kernel>,
        ownership: Ownership,
        behavior: crate::process::Behavior,
    ) -> Process {
        let process = Process::new(
            next_process_id(),
            self.name,
            self.priority,
            ownership,
            behavior,
            Rc::downgrade(kernel),
        );
        debug!(
            pid = process.id(),
            name = %process.name(),
            priority = process.priority(),
            ?ownership,
            "process created"
        );
        process
    }
}

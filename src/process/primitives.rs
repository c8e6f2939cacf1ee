/*!
 * Suspension Primitives
 *
 * Wait, Activate, Passivate, Interrupt, Terminate and WaitUntil. Each one
 * changes the calendar first and suspends only when applied by the running
 * process to itself.
 */

use super::dispatcher;
use super::handle::Process;
use super::types::{ProcessStatus, TerminateSignal};
use crate::core::errors::ProcessError;
use crate::core::types::{SimResult, SimTime};
use std::panic;
use tracing::{debug, trace};

impl Process {
    /// Suspend the running process for `duration` time units
    ///
    /// A zero duration reschedules at the current time behind every entry
    /// already there with the same priority.
    pub fn wait(&self, duration: SimTime) -> SimResult<()> {
        self.ensure_alive()?;
        if !(duration >= 0.0) || !duration.is_finite() {
            return Err(ProcessError::InvalidDuration { duration }.into());
        }
        let kernel = self.kernel()?;
        let at = kernel.now() + duration;
        trace!(pid = self.id(), at, "wait");
        kernel.schedule(self, at)?;
        drop(kernel);
        self.suspend_if_current()
    }

    /// Schedule at the current time
    ///
    /// Applied to another process this only touches the calendar; applied
    /// to oneself it also yields.
    pub fn activate(&self) -> SimResult<()> {
        let now = self.kernel()?.now();
        self.activate_at(now)
    }

    /// Schedule at `time`, replacing any pending activation
    pub fn activate_at(&self, time: SimTime) -> SimResult<()> {
        self.ensure_alive()?;
        let kernel = self.kernel()?;
        kernel.schedule(self, time)?;
        drop(kernel);
        self.suspend_if_current()
    }

    /// Remove from the calendar; suspends indefinitely if running
    pub fn passivate(&self) -> SimResult<()> {
        self.ensure_alive()?;
        let kernel = self.kernel()?;
        kernel.unschedule(self);
        drop(kernel);
        trace!(pid = self.id(), "passivate");
        self.suspend_if_current()
    }

    /// Yield to every other process due at the current time
    ///
    /// Only the running process may interrupt itself.
    pub fn interrupt(&self) -> SimResult<()> {
        self.ensure_alive()?;
        if !self.is_current() {
            return Err(ProcessError::NotCurrent(self.id()).into());
        }
        let kernel = self.kernel()?;
        let now = kernel.now();
        kernel.schedule(self, now)?;
        drop(kernel);
        dispatcher::suspend(self)
    }

    /// Kill the process
    ///
    /// Self-termination does not return: the behavior unwinds, dropping its
    /// locals, and the dispatcher finalizes it. A suspended process is
    /// finalized at once and unwound the next time no dispatch is active.
    /// Until that unwinding its handle stays alive, so an engine-owned
    /// process is released only after the current dispatch returns.
    /// Terminating an already terminated process does nothing.
    pub fn terminate(&self) -> SimResult<()> {
        if self.is_terminated() {
            return Ok(());
        }
        if self.is_current() {
            debug!(pid = self.id(), "process terminating itself");
            if let Ok(kernel) = self.kernel() {
                kernel.detach(self);
            }
            self.set_status(ProcessStatus::Terminated);
            panic::resume_unwind(Box::new(TerminateSignal));
        }
        let kernel = self.kernel()?;
        kernel.terminate_other(self);
        Ok(())
    }

    /// Block the running process until `condition` holds
    ///
    /// The condition is re-evaluated after every event the simulation
    /// processes. Returns at once if it already holds.
    pub fn wait_until<F>(&self, mut condition: F) -> SimResult<()>
    where
        F: FnMut() -> bool,
    {
        self.ensure_alive()?;
        if !self.is_current() {
            return Err(ProcessError::NotCurrent(self.id()).into());
        }
        loop {
            let kernel = self.kernel()?;
            if condition() {
                kernel.stop_waiting(self);
                return Ok(());
            }
            kernel.start_waiting(self);
            kernel.unschedule(self);
            // no strong handle may sit in the suspended image
            drop(kernel);
            if let Err(err) = dispatcher::suspend(self) {
                self.kernel()?.stop_waiting(self);
                return Err(err);
            }
        }
    }

    fn suspend_if_current(&self) -> SimResult<()> {
        if self.is_current() {
            dispatcher::suspend(self)
        } else {
            Ok(())
        }
    }
}

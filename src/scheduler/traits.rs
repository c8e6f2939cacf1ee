/*!
 * Scheduler Traits
 * Interface between the process engine and the event calendar
 */

use crate::core::types::SimTime;
use crate::process::Process;

/// Time-ordered agenda of pending activations
///
/// At most one pending activation per process: scheduling a process that
/// is already scheduled replaces its entry.
pub trait Calendar: std::fmt::Debug {
    /// Schedule `process` at `time`, replacing any pending entry
    fn schedule_at(&mut self, process: &Process, time: SimTime);

    /// Drop the pending entry of `process`; returns whether one existed
    fn unschedule(&mut self, process: &Process) -> bool;

    /// Whether `process` has a pending entry
    fn is_scheduled(&self, process: &Process) -> bool;

    /// Time of the pending entry of `process`
    fn activation_time(&self, process: &Process) -> Option<SimTime>;

    /// Remove and return the next entry due no later than `until`
    fn pop_next(&mut self, until: SimTime) -> Option<(SimTime, Process)>;

    /// Time of the next pending entry
    fn peek_time(&mut self) -> Option<SimTime>;

    /// Number of pending entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending entry
    fn clear(&mut self);
}

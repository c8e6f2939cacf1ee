/*!
 * Process Types
 * Common types for the process lifecycle
 */

use super::Process;
use crate::core::types::SimResult;
use serde::{Deserialize, Serialize};

/// Lifecycle status
///
/// ```text
///  Prepared --dispatch--> Running --suspend--> Interrupted
///                            ^                      |
///                            +------dispatch--------+
///  Running --return/terminate--> Terminated (absorbing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Created, behavior not started, no saved context
    Prepared,
    /// Executing on the dispatch stack
    Running,
    /// Suspended with a saved context
    Interrupted,
    /// Finished or killed
    Terminated,
}

impl ProcessStatus {
    /// Whether the dispatcher accepts a process in this state
    #[inline(always)]
    #[must_use]
    pub const fn is_dispatchable(self) -> bool {
        matches!(self, ProcessStatus::Prepared | ProcessStatus::Interrupted)
    }
}

/// Who keeps a process alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// The simulation holds the only strong reference and drops it at termination
    Engine,
    /// The caller holds the process; the simulation only tracks it weakly
    Caller,
}

/// Life cycle of one process, written as ordinary sequential code
pub type Behavior = Box<dyn FnOnce(&Process) -> SimResult<()> + 'static>;

/// Unwinding payload used to leave a behavior from any depth
pub(crate) struct TerminateSignal;

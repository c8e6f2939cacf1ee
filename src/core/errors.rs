/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 *
 * Only usage errors are values. A failed integrity check on a saved or
 * restored stack is never returned: see `context::fatal`.
 */

use super::types::{Name, ProcessId, SimTime};
use crate::process::ProcessStatus;
use miette::Diagnostic;
use thiserror::Error;

/// Lifecycle usage errors
#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
pub enum ProcessError {
    #[error("Process {id} cannot be dispatched in state {status:?}")]
    #[diagnostic(
        code(process::not_dispatchable),
        help("Only Prepared or Interrupted processes can be dispatched.")
    )]
    NotDispatchable { id: ProcessId, status: ProcessStatus },

    #[error("Dispatch called while another dispatch is in progress")]
    #[diagnostic(
        code(process::reentrant_dispatch),
        help("Dispatch runs from the simulation loop only, never from behavior code.")
    )]
    ReentrantDispatch,

    #[error("Process {0} is not the running process")]
    #[diagnostic(
        code(process::not_current),
        help("This primitive suspends its caller and may only be invoked by the running process on itself.")
    )]
    NotCurrent(ProcessId),

    #[error("Process {0} is terminated")]
    #[diagnostic(code(process::terminated))]
    Terminated(ProcessId),

    #[error("Process {0} outlived its simulation")]
    #[diagnostic(
        code(process::detached),
        help("The owning Simulation was dropped; the process can no longer be scheduled.")
    )]
    Detached(ProcessId),

    #[error("Invalid activation time: {time}")]
    #[diagnostic(code(process::invalid_time))]
    InvalidTime { time: SimTime },

    #[error("Activation time {time} is before current time {now}")]
    #[diagnostic(code(process::schedule_in_past))]
    ScheduleInPast { time: SimTime, now: SimTime },

    #[error("Invalid wait duration: {duration}")]
    #[diagnostic(
        code(process::invalid_duration),
        help("Durations must be finite and non-negative.")
    )]
    InvalidDuration { duration: SimTime },

    #[error("Process {0} belongs to another simulation")]
    #[diagnostic(
        code(process::foreign_process),
        help("A process runs only on the dispatch stack of the simulation that created it.")
    )]
    ForeignProcess(ProcessId),

    #[error("Behavior of process {0} panicked")]
    #[diagnostic(code(process::panicked))]
    Panicked(ProcessId),
}

/// Errors reported by facilities, stores and queues
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ResourceError {
    #[error("{process} does not hold facility {facility}")]
    #[diagnostic(
        code(resource::not_holder),
        help("Release must be called by the process that seized the facility.")
    )]
    NotHolder { facility: Name, process: Name },

    #[error("{store}: requested {requested} exceeds capacity {capacity}")]
    #[diagnostic(code(resource::capacity_exceeded))]
    CapacityExceeded {
        store: Name,
        requested: u64,
        capacity: u64,
    },

    #[error("{store}: cannot leave {requested}, only {used} in use")]
    #[diagnostic(code(resource::leave_underflow))]
    LeaveUnderflow {
        store: Name,
        requested: u64,
        used: u64,
    },

    #[error("{process} was resumed before store {store} admitted it")]
    #[diagnostic(
        code(resource::not_admitted),
        help("A process waiting in a store queue must not be activated by other processes.")
    )]
    NotAdmitted { store: Name, process: Name },

    #[error("{process} is not waiting in queue {queue}")]
    #[diagnostic(code(resource::not_queued))]
    NotQueued { queue: Name, process: Name },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    #[diagnostic(code(config::io))]
    Io(Name),

    #[error("Cannot parse configuration: {0}")]
    #[diagnostic(
        code(config::parse),
        help("Configuration files are JSON objects with snake_case keys.")
    )]
    Parse(Name),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(config::invalid))]
    Invalid(Name),

    #[error("Cannot map dispatch stack: {0}")]
    #[diagnostic(
        code(config::stack_allocation),
        help("The stack size may exceed the process stack limit (ulimit -s).")
    )]
    StackAllocation(Name),
}

/// Unified simulation error
#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
pub enum SimError {
    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Resource error: {0}")]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Behavior error: {0}")]
    #[diagnostic(code(sim::behavior))]
    Behavior(Name),
}

impl SimError {
    /// Error raised by model code inside a behavior
    pub fn behavior(msg: impl AsRef<str>) -> Self {
        SimError::Behavior(msg.as_ref().into())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string().into())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string().into())
    }
}

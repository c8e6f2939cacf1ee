/*!
 * procsim
 *
 * Cooperative process engine for discrete-event simulation. Each process
 * is written as ordinary sequential code that suspends itself through
 * Wait, Activate, Passivate, Interrupt and Terminate, or by blocking on a
 * facility, store or queue. Suspended call stacks are copied out of a
 * shared dispatch stack and copied back when the process is resumed.
 */

pub mod context;
pub mod core;
pub mod monitoring;
pub mod process;
pub mod resources;
pub mod scheduler;

// Re-exports
pub use crate::core::config::EngineConfig;
pub use crate::core::errors::{ConfigError, ProcessError, ResourceError, SimError};
pub use crate::core::types::{Name, Priority, ProcessId, ServicePriority, SimResult, SimTime};
pub use monitoring::{init_tracing, DispatchStats};
pub use process::{Behavior, Ownership, Process, ProcessRef, ProcessStatus};
pub use resources::{EnterLeave, Facility, ProcessQueue, Queue, SeizeRelease, Store};
pub use scheduler::{Calendar, EventCalendar, ProcessBuilder, SimHandle, Simulation, SimulationBuilder};

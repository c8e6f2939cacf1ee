/*!
 * Scheduler Module
 * Event calendar, kernel state and the simulation run loop
 */

pub mod calendar;
pub(crate) mod kernel;
pub mod simulation;
pub mod traits;

// Re-export public API
pub use calendar::EventCalendar;
pub use simulation::{ProcessBuilder, SimHandle, Simulation, SimulationBuilder};
pub use traits::Calendar;

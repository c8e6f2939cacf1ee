/*!
 * Monitoring
 * Structured logging and dispatch counters
 */

mod stats;
mod tracer;

pub use stats::DispatchStats;
pub use tracer::{init_tracing, DispatchSpan, ENV_TRACE_JSON};

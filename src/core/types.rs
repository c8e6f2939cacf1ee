/*!
 * Core Types
 * Common types used across the engine
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// Process identity, unique for the lifetime of the program
pub type ProcessId = u64;

/// Scheduling priority (0-255, higher runs first among processes due at the same time)
pub type Priority = u8;

/// Service priority used by facilities to order their waiting line
pub type ServicePriority = u8;

/// Simulated time
pub type SimTime = f64;

/// Inline-optimized name for processes and resources
pub type Name = smartstring::alias::String;

/// Common result type for engine operations
pub type SimResult<T> = Result<T, super::errors::SimError>;

static NEXT_PROCESS_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh process identity
#[inline]
pub(crate) fn next_process_id() -> ProcessId {
    NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed)
}

/*!
 * Engine Limits and Constants
 *
 * Centralized location for sizes, sentinels and thresholds used by the
 * context-switching machinery. Grouped by domain like the rest of `core`.
 */

use std::time::Duration;

// =============================================================================
// DISPATCH STACK
// =============================================================================

/// Default size of the shared dispatch stack (1MB)
/// Every process of a simulation executes its behavior on this region
pub const DEFAULT_DISPATCH_STACK: usize = 1024 * 1024;

/// Smallest accepted dispatch stack (64KB)
pub const MIN_DISPATCH_STACK: usize = 64 * 1024;

/// Default guard zone painted at the low end of the dispatch stack (4KB)
pub const DEFAULT_GUARD_SIZE: usize = 4 * 1024;

/// Alignment of the dispatch stack top and of every size in its configuration
/// [ABI] both System V x86_64 and AAPCS64 require 16-byte stack alignment at calls
pub const STACK_ALIGN: usize = 16;

// =============================================================================
// SENTINELS
// =============================================================================

/// Word painted over the guard zone
pub const GUARD_PATTERN: u64 = 0x5A5A_C0DE_5A5A_C0DE;

/// Suspend-frame sentinel, checked right after every resumption
pub const SUSPEND_CANARY: u64 = 0xDEAD_BEEF;

/// Salt mixed with the process identity for the dispatcher-frame sentinel
pub const DISPATCH_CANARY_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// CALENDAR
// =============================================================================

/// Stale heap entries tolerated before the calendar compacts itself
/// [PERF] lazy deletion keeps unschedule O(1); compaction amortizes the cleanup
pub const CALENDAR_COMPACT_SLACK: usize = 64;

// =============================================================================
// OBSERVABILITY
// =============================================================================

/// Wall-clock duration above which a single dispatch is reported as slow
pub const SLOW_DISPATCH_THRESHOLD: Duration = Duration::from_millis(10);

/*!
 * Dispatch Statistics
 * Counters maintained by the dispatcher, serializable for reporting
 */

use serde::{Deserialize, Serialize};

/// Snapshot of dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchStats {
    /// Calls into the dispatcher, including cancellations
    pub dispatches: u64,
    /// Behaviors started from the beginning
    pub starts: u64,
    /// Saved contexts restored
    pub resumes: u64,
    /// Saved contexts captured
    pub suspensions: u64,
    pub terminations: u64,
    /// Suspended processes unwound after being terminated
    pub reaped: u64,
    pub bytes_captured: u64,
    pub bytes_restored: u64,
    /// Largest single stack image captured
    pub peak_image_bytes: u64,
}

impl DispatchStats {
    /// Average captured image size in bytes
    pub fn average_image_bytes(&self) -> f64 {
        if self.suspensions == 0 {
            0.0
        } else {
            self.bytes_captured as f64 / self.suspensions as f64
        }
    }
}

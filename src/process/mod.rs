/*!
 * Process Module
 * Cooperative processes: lifecycle, dispatch and suspension primitives
 */

mod dispatcher;
mod forwarding;
mod handle;
mod primitives;
pub mod types;

pub(crate) use dispatcher::{current_process_id, is_active};
pub use handle::{Process, ProcessRef};
pub use types::{Behavior, Ownership, ProcessStatus};

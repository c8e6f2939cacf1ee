/*!
 * Resources Module
 * Queues, facilities and stores that processes contend for
 */

mod facility;
mod queue;
mod store;
pub mod traits;

pub use facility::Facility;
pub use queue::{Queue, Rank};
pub use store::Store;
pub use traits::{EnterLeave, ProcessQueue, SeizeRelease};

//! Transformations over event sequences read from a datastore.
//!
//! - [`flood`] compacts a retrieved sequence by merging or snapping
//!   near-contiguous neighbours.
//! - [`heartbeat`] extends the most recent event of a bucket in place when a
//!   new observation continues it.

mod flood;
mod heartbeat;

pub use flood::{DEFAULT_PULSETIME, flood};
pub use heartbeat::{heartbeat, heartbeat_merge};

//! Value types shared by every broker: records, put options and the
//! iterators returned by list calls.

mod iterator;
mod options;
mod record;

pub use iterator::*;
pub use options::*;
pub use record::*;

/// Monotonic version counter assigned by the store to every mutation
pub type Revision = i64;

/// Store-managed expiry handle
pub type LeaseId = i64;

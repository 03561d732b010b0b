//! World-side systems: proximity activation, per-object scheduling and
//! ownership.

pub mod activation;
pub mod authority;
pub mod interaction;
pub mod priority;
pub mod response;

/// Stable identity of a world object. Valid ids start at 1.
pub type ObjectId = u32;

/// Player index. The configured player count doubles as the "no owner"
/// sentinel in authority bookkeeping.
pub type PlayerId = u8;

use crate::math::Vec3;
use crate::net::stream::{self, Stream};
use crate::sim::ObjectId;

/// Persistent record of a world object: the authoritative store while the
/// object sleeps outside the activation radius.
pub trait DatabaseObject: Clone + Default {
    type Active: ActiveObject;

    /// World position used for grid placement.
    fn position(&self) -> Vec3;

    /// Builds the live representation when the object activates.
    fn to_active(&self, id: ObjectId) -> Self::Active;

    /// Writes live state back into the record when the object deactivates.
    fn from_active(&mut self, active: &Self::Active);
}

/// Live representation of an object inside the activation radius: what gets
/// simulated and replicated.
pub trait ActiveObject: Clone + Default {
    /// Upper bound on the bits `pack` produces, for send scheduling.
    const PACKED_BITS: usize;

    fn id(&self) -> ObjectId;
    fn set_id(&mut self, id: ObjectId);
    fn position(&self) -> Vec3;

    /// Serializes the replicated state, excluding the id (the scheduler
    /// frames that).
    fn pack(&self, stream: &mut Stream<'_>) -> stream::Result<()>;
    fn unpack(&mut self, stream: &mut Stream<'_>) -> stream::Result<()>;

    /// Replication urgency accumulated per second while active.
    fn priority(&self) -> f32;
}

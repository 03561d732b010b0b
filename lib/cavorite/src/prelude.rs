//! Commonly used exports.

pub use crate::game::{ActiveObject, Config, DatabaseObject, Instance, FLAG_PAUSE};
pub use crate::math::{Quat, Vec3};
pub use crate::net::address::Address;
pub use crate::net::bitpack::{BitPacker, Mode};
pub use crate::net::connection::Connection;
pub use crate::net::mesh::Mesh;
pub use crate::net::node::Node;
pub use crate::net::reliable::ReliableConnection;
pub use crate::net::socket::{init_sockets, shutdown_sockets, Socket};
pub use crate::net::stream::{bits_required, Stream};
pub use crate::sim::activation::ActivationSystem;
pub use crate::sim::authority::AuthorityManager;
pub use crate::sim::interaction::{InteractionManager, InteractionPair};
pub use crate::sim::priority::PrioritySet;
pub use crate::sim::response::{Response, ResponseQueue};
pub use crate::sim::{ObjectId, PlayerId};

//! Node identifier allocation.

use uuid::Uuid;

use crate::tree::NodeId;

/// Allocate a fresh node id (random UUID v4, 122 bits of entropy).
pub fn new_id() -> NodeId {
    NodeId::new(Uuid::new_v4().to_string())
}

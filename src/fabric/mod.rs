mod graph;
mod roles;

pub use graph::FabricGraph;
pub use roles::{FabricLink, InterfaceClass, RoleAssignment, RoleResolver};

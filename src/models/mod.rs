mod document;
mod ipam;
mod report;
mod topology;

pub use document::*;
pub use ipam::*;
pub use report::*;
pub use topology::*;

pub mod client;
pub mod sync;
pub mod types;

pub use client::NetBoxClient;
pub use sync::sync_push;
pub use types::SyncResult;

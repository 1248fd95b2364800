pub mod controller;
pub mod protocol;
pub mod transport;

pub use controller::{Outcome, SyncController, SyncStatus};
pub use protocol::{SyncRequest, SyncResponse};
pub use transport::{HttpTransport, SyncTransport};

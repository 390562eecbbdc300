// Library exports for dropship
// The binary is a thin CLI over `coordinator::run_forever`; tests drive the same modules.

pub mod coordinator;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod services;
pub mod utils;

pub use coordinator::{Coordinator, run_forever};
pub use error::{SyncError, SyncResult};

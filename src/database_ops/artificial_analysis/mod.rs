pub mod provider;
pub mod sync;

pub use provider::AnalysisProvider;
pub use sync::{SyncEngine, SyncError, SyncResult};

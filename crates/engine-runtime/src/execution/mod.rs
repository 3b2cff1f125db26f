pub mod executor;
pub mod metadata;
pub mod transform;
pub mod workers;

pub use executor::{SyncReport, SyncRun};
pub use transform::{TransformReport, TransformRun};
pub use workers::{DispatchOutcome, Dispatcher};

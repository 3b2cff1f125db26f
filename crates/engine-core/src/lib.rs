pub mod context;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod progress;
pub mod retry;

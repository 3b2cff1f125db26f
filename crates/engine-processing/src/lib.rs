pub mod batch;
pub mod classify;
pub mod error;
pub mod lookup;
pub mod mapping;
pub mod partition;
pub mod sanitize;

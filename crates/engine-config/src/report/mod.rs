pub mod audit;
pub mod finding;
pub mod summary;

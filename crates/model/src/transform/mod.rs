pub mod lookup;
pub mod mapping;

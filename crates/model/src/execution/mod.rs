pub mod outcome;
pub mod write;

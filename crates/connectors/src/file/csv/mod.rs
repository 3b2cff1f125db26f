pub mod reader;

pub use reader::{parse_cell, read_dataset};

//! Modification-time keyed task index

mod file_index;

pub use file_index::{FileIndex, FileRecord};

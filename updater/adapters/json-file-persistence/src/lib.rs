pub use json_file_persistence::*;

mod json_file_persistence;

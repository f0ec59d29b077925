pub use inmemory_persistence::*;

mod inmemory_persistence;

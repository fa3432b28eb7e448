//! Flat Store 实现

mod json_file_store;
mod memory_store;

pub use json_file_store::JsonFileFlatStore;
pub use memory_store::InMemoryFlatStore;

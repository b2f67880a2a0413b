pub mod memory;

pub use memory::MemoryRecordStore;

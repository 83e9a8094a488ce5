pub mod archive;
pub mod file_store;
pub mod registry;
pub mod sweeper;

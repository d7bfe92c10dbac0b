pub mod config;
pub mod json_store;
pub mod memory_store;
pub mod paths;

pub use config::{AppConfig, ConfigService};
pub use json_store::JsonStore;
pub use memory_store::MemoryStore;
pub use paths::WayfarePaths;

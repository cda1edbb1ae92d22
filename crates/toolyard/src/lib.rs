pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod registry;
pub mod schema;
pub mod server;
pub mod store;

pub use crate::error::{RegistryError, RegistryResult};
pub use crate::executor::{AcknowledgingRunner, ToolRunner};
pub use crate::registry::RegistryService;
pub use crate::store::{SharedStore, SqliteStore, ToolStore};

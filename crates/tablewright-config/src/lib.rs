pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, DATABASE_URL_ENV, read_document};
pub use model::{AppConfig, DatabaseConfig, LogConfig, MigrationConfig};

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::ProductCatalog;
pub use config::{Config, CrawlConfig, FileConfig, SourceConfig};
pub use error::LeadSignalError;
pub use types::*;

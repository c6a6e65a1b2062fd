//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - `download`: Bulk contract-id and historical-bar downloads
//! - `market_data`: Stored bars
//! - `queue`: Queue and worker pool statistics
//! - `config`: Configuration
//! - `system`: Health and OpenAPI

mod config;
mod download;
mod market_data;
mod queue;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use config::*;
pub use download::*;
pub use market_data::*;
pub use queue::*;
pub use system::*;

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod informer;
pub mod router;
pub mod shutdown;
pub mod sink;
pub mod supervisor;
pub mod utils;

pub use error::Error;

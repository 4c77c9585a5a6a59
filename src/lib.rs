pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod pipeline;
pub mod schema;
pub mod service;
pub mod store;
pub mod types;

pub use error::DataError;
pub use service::{DataService, MutationRequest};

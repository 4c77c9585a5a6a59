pub mod data_service;

pub use data_service::{DataService, MutationOutcome, MutationRequest, ServiceOptions};

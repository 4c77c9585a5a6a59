pub mod error;
pub mod filter_order;
pub mod operator;
pub mod parser;
pub mod types;

pub use error::FilterError;
pub use filter_order::FilterOrder;
pub use operator::Operator;
pub use parser::{ParserOptions, QueryParameter, QueryParser};
pub use types::*;

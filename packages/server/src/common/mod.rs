// Common types and utilities shared across the application

pub mod encoding;
pub mod entity_ids;
pub mod error;
pub mod id;
pub mod pagination;
pub mod types;

pub use entity_ids::*;
pub use error::{AppError, AppResult};
pub use id::{Id, V4, V7};
pub use pagination::{Filter, FilterOp, ListRequest, Paginated, Sort, SortDirection};
pub use types::*;

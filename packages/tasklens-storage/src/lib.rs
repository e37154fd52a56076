pub mod db;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;
pub mod schema;
pub mod store;
pub mod vector;

mod error;

pub use error::Error;
pub use store::{BoxFuture, TaskDirectory, VectorStore};

pub type Result<T, E = Error> = std::result::Result<T, E>;

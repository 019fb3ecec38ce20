mod db;
mod error;
mod pg;
mod qdrant;
pub mod sql;

pub use db::Db;
pub use error::{Error, Result};
pub use pg::PgStore;
pub use qdrant::QdrantStore;

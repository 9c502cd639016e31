pub mod db;
pub mod directory;
pub mod models;
pub mod notifications;
pub mod percentiles;
pub mod schema;

mod error;

pub use error::{Error, PartialInsert};

pub type Result<T, E = Error> = std::result::Result<T, E>;

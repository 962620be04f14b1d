pub mod postgres;
pub mod sqlite;
pub mod trait_def;

mod rows;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

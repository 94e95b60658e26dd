// src/repositories/sqlite/mod.rs
//
// SQLite-backed executor and store

pub mod post_store;
pub mod sql_translator;
pub mod sqlite_query_executor;

pub use post_store::SqlitePostStore;
pub use sqlite_query_executor::SqliteQueryExecutor;

// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - The read repository never writes; stores never query
// - Storage is reached only through the `QueryExecutor` trait
// - Explicit SQL only, inside the sqlite module

pub mod query_executor;
pub mod read_repository;
pub mod sqlite;

#[cfg(test)]
mod read_repository_tests;


pub use query_executor::{Execution, QueryExecutor, Rows};
pub use read_repository::{Item, ReadRepository};
pub use sqlite::{SqlitePostStore, SqliteQueryExecutor};

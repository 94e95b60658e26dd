// src/db/mod.rs
//
// Database module
//
// Provides:
// - Connection pooling
// - Schema migrations
// - SQL functions the executor relies on (REGEXP)

pub mod connection;
pub mod migrations;

pub use connection::{
    create_connection_pool, create_memory_pool, create_test_connection, get_connection,
    get_database_path, register_sql_functions, ConnectionPool, PooledConn,
};

pub use migrations::initialize_database;

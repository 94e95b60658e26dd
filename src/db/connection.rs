// src/db/connection.rs
//
// Database connection management
//
// PRINCIPLES:
// - Explicit connection pooling
// - Every pooled connection is initialized the same way (pragmas, REGEXP)
// - Clear error propagation
// - The schema is applied when the pool is created

use std::path::PathBuf;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use super::migrations::initialize_database;
use crate::config::RepositoryConfig;
use crate::error::{AppError, AppResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Default database file
///
/// Path structure: {APP_DATA}/postquery/postquery.db
pub fn get_database_path() -> AppResult<PathBuf> {
    let app_data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Config("Could not determine app data directory".to_string()))?;

    let postquery_dir = app_data_dir.join("postquery");
    std::fs::create_dir_all(&postquery_dir)?;

    Ok(postquery_dir.join("postquery.db"))
}

/// Registers `regexp(pattern, value)`, which backs SQLite's `X REGEXP Y`.
/// Compiled patterns are cached per statement.
pub fn register_sql_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let matched = match ctx.get_raw(1) {
                rusqlite::types::ValueRef::Null => false,
                rusqlite::types::ValueRef::Integer(i) => regex.is_match(&i.to_string()),
                rusqlite::types::ValueRef::Real(f) => regex.is_match(&f.to_string()),
                rusqlite::types::ValueRef::Text(t) | rusqlite::types::ValueRef::Blob(t) => {
                    regex.is_match(&String::from_utf8_lossy(t))
                }
            };
            Ok(matched)
        },
    )
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    register_sql_functions(conn)
}

/// Create a file-backed connection pool
///
/// Pool configuration:
/// - `pool_size` connections from the config
/// - SQLite in WAL mode for concurrent readers
/// - Foreign keys enabled
/// - Schema initialized before the pool is returned
pub fn create_connection_pool(config: &RepositoryConfig) -> AppResult<ConnectionPool> {
    let db_path = match &config.database_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            path.clone()
        }
        None => get_database_path()?,
    };

    let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        init_connection(conn)
    });

    let pool = Pool::builder()
        .max_size(config.pool_size)
        .build(manager)
        .map_err(|e| AppError::Pool(format!("Failed to create connection pool: {}", e)))?;

    {
        let conn = get_connection(&pool)?;
        initialize_database(&conn)?;
    }
    log::debug!("opened database at {}", db_path.display());
    Ok(pool)
}

/// Create a single-connection in-memory pool
///
/// The one connection is kept alive for the pool's lifetime, since an
/// in-memory database vanishes with its connection.
pub fn create_memory_pool() -> AppResult<ConnectionPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_connection);

    let pool = Pool::builder()
        .max_size(1)
        .min_idle(Some(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
        .map_err(|e| AppError::Pool(format!("Failed to create memory pool: {}", e)))?;

    {
        let conn = get_connection(&pool)?;
        initialize_database(&conn)?;
    }
    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &ConnectionPool) -> AppResult<PooledConn> {
    pool.get()
        .map_err(|e| AppError::Pool(format!("Failed to get database connection: {}", e)))
}

/// Create a standalone in-memory connection (for testing)
pub fn create_test_connection() -> AppResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_connection(&mut conn)?;
    Ok(conn)
}

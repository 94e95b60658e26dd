// src/lib.rs
// postquery - fluent, caching query repository over posts, metadata and terms
//
// Architecture:
// - Query layer: filters -> fragments -> argument set -> spec -> compiled query
// - Caching: one compile per argument-set version, every view served from it
// - Explicit: executor and filter registry are injected, never global
// - Storage behind a trait: SQLite ships as the concrete executor

// ============================================================================
// CORE
// ============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod query;
pub mod repositories;

// ============================================================================
// PERSISTENCE
// ============================================================================

pub mod db;

// ============================================================================
// PUBLIC API - Domain
// ============================================================================

pub use domain::{NewPost, NewTerm, Post, PostId, Term, TermId};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Query Building
// ============================================================================

pub use query::{
    ArgumentSet, CacheState, Clock, CombineStrategy, CompiledQuery, Filter, FilterArg,
    FilterContext, FilterRegistry, FixedClock, Fragment, Order, OrderBy, Projection, QueryId,
    QuerySpec, SystemClock,
};

// ============================================================================
// PUBLIC API - Repositories
// ============================================================================

pub use config::RepositoryConfig;
pub use repositories::{
    Execution, Item, QueryExecutor, ReadRepository, Rows, SqlitePostStore, SqliteQueryExecutor,
};

// src/repositories/sqlite/sqlite_query_executor.rs
//
// SQLite query executor
//
// RULES:
// - `compile` only translates; it never opens a connection
// - One pooled connection per call, released before returning
// - Page rows and the found count come from the same connection

use std::collections::HashMap;

use rusqlite::types::ToSqlOutput;
use rusqlite::{params_from_iter, ToSql};

use crate::db::{get_connection, ConnectionPool};
use crate::domain::{Post, PostId};
use crate::error::AppResult;
use crate::query::{BindValue, CompiledQuery, Projection, QuerySpec};
use crate::repositories::query_executor::{Execution, QueryExecutor, Rows};

use super::post_store::{row_to_post, POST_COLUMNS};
use super::sql_translator::{order_clause, translate};

impl ToSql for BindValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            BindValue::Int(i) => ToSqlOutput::from(*i),
            BindValue::Real(f) => ToSqlOutput::from(*f),
            BindValue::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

pub struct SqliteQueryExecutor {
    pool: ConnectionPool,
}

impl SqliteQueryExecutor {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn page_sql(query: &CompiledQuery, select: &str) -> String {
        let spec = query.spec();
        format!(
            "SELECT {} FROM posts p WHERE {} {} LIMIT ? OFFSET ?",
            select,
            query.statement(),
            order_clause(spec.order_by, spec.order)
        )
    }

    fn count_sql(query: &CompiledQuery) -> String {
        format!("SELECT COUNT(*) FROM posts p WHERE {}", query.statement())
    }

    /// Statement bindings followed by LIMIT and OFFSET
    fn page_bindings(query: &CompiledQuery) -> Vec<BindValue> {
        let spec = query.spec();
        let limit = spec
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let skip = i64::try_from(spec.skip).unwrap_or(i64::MAX);

        let mut bindings = query.bindings().to_vec();
        bindings.push(BindValue::Int(limit));
        bindings.push(BindValue::Int(skip));
        bindings
    }

    fn count_on(conn: &rusqlite::Connection, query: &CompiledQuery) -> AppResult<u64> {
        let found: i64 = conn.query_row(
            &Self::count_sql(query),
            params_from_iter(query.bindings()),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(found).unwrap_or_default())
    }
}

impl QueryExecutor for SqliteQueryExecutor {
    fn compile(&self, spec: &QuerySpec) -> AppResult<CompiledQuery> {
        let predicate = translate(spec);
        log::trace!("compiled predicate: {}", predicate.sql);
        CompiledQuery::new(spec.clone(), predicate.sql, predicate.bindings)
    }

    fn run(&self, query: &CompiledQuery, projection: Projection) -> AppResult<Execution> {
        let conn = get_connection(&self.pool)?;
        let bindings = Self::page_bindings(query);

        let rows = match projection {
            Projection::Ids => {
                let mut stmt = conn.prepare(&Self::page_sql(query, "p.id"))?;
                let ids = stmt
                    .query_map(params_from_iter(&bindings), |row| row.get::<_, PostId>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Rows::Ids(ids)
            }
            Projection::Objects => {
                let mut stmt = conn.prepare(&Self::page_sql(query, POST_COLUMNS))?;
                let posts = stmt
                    .query_map(params_from_iter(&bindings), row_to_post)?
                    .collect::<Result<Vec<_>, _>>()?;
                Rows::Posts(posts)
            }
        };

        let found = Self::count_on(&conn, query)?;
        Ok(Execution {
            rows,
            found: Some(found),
        })
    }

    fn reproject(&self, _query: &CompiledQuery, ids: &[PostId]) -> AppResult<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = get_connection(&self.pool)?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM posts p WHERE p.id IN ({})",
            POST_COLUMNS, placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut by_id: HashMap<PostId, Post> = stmt
            .query_map(params_from_iter(ids), row_to_post)?
            .map(|post| post.map(|p| (p.id, p)))
            .collect::<Result<_, _>>()?;

        // Keep the order the ids were fetched in; rows deleted since are skipped.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn found_count(&self, query: &CompiledQuery) -> AppResult<u64> {
        let conn = get_connection(&self.pool)?;
        Self::count_on(&conn, query)
    }
}

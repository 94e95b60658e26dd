// src/repositories/sqlite/post_store.rs
//
// Post persistence for the SQLite executor
//
// Writes posts, metadata and term assignments. The fluent repository is
// read-only; this store is how a database gets its content.

use chrono::{Duration, FixedOffset, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{get_connection, ConnectionPool};
use crate::domain::{
    slugify, validate_new_post, validate_new_term, NewPost, NewTerm, Post, PostId, Term, TermId,
};
use crate::error::AppResult;
use crate::query::dates::{format_storage, STORAGE_FORMAT};

/// Column list matching `row_to_post`
pub const POST_COLUMNS: &str = "p.id, p.post_type, p.title, p.content, p.excerpt, p.slug, \
                                p.status, p.author, p.parent, p.menu_order, p.date, p.date_gmt";

fn parse_stored_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, STORAGE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Maps a row selected with `POST_COLUMNS`
pub fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        post_type: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        slug: row.get(5)?,
        status: row.get(6)?,
        author: row.get(7)?,
        parent: row.get(8)?,
        menu_order: row.get(9)?,
        date: parse_stored_date(row, 10)?,
        date_gmt: parse_stored_date(row, 11)?,
    })
}

pub struct SqlitePostStore {
    pool: ConnectionPool,
    offset: FixedOffset,
}

impl SqlitePostStore {
    /// `offset` converts local post dates to their UTC counterpart
    pub fn new(pool: ConnectionPool, offset: FixedOffset) -> Self {
        Self { pool, offset }
    }

    fn to_gmt(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    /// Inserts the post and its metadata in one transaction
    pub fn insert_post(&self, post: &NewPost) -> AppResult<PostId> {
        validate_new_post(post)?;

        let date = post
            .date
            .unwrap_or_else(|| Utc::now().with_timezone(&self.offset).naive_local());
        let date_gmt = self.to_gmt(date);
        let slug = if post.slug.is_empty() {
            slugify(&post.title)
        } else {
            post.slug.clone()
        };

        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO posts (post_type, title, content, excerpt, slug, status, author, parent, menu_order, date, date_gmt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                post.post_type,
                post.title,
                post.content,
                post.excerpt,
                slug,
                post.status,
                post.author,
                post.parent,
                post.menu_order,
                format_storage(&date),
                format_storage(&date_gmt),
            ],
        )?;
        let id = tx.last_insert_rowid();

        for (key, value) in &post.meta {
            tx.execute(
                "INSERT INTO postmeta (post_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
                params![id, key, value],
            )?;
        }
        tx.commit()?;

        log::debug!("inserted post {} ({})", id, post.post_type);
        Ok(id)
    }

    /// Adds one metadata row; existing rows for the key are kept
    pub fn add_meta(&self, post_id: PostId, key: &str, value: &str) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        conn.execute(
            "INSERT INTO postmeta (post_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
            params![post_id, key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, post_id: PostId, key: &str) -> AppResult<Vec<String>> {
        let conn = get_connection(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT meta_value FROM postmeta WHERE post_id = ?1 AND meta_key = ?2 ORDER BY meta_id",
        )?;
        let values = stmt
            .query_map(params![post_id, key], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }

    pub fn create_term(&self, term: &NewTerm) -> AppResult<Term> {
        validate_new_term(term)?;
        let slug = term.effective_slug();

        let conn = get_connection(&self.pool)?;
        conn.execute(
            "INSERT INTO terms (taxonomy, name, slug) VALUES (?1, ?2, ?3)",
            params![term.taxonomy, term.name, slug],
        )?;

        Ok(Term {
            id: conn.last_insert_rowid(),
            taxonomy: term.taxonomy.clone(),
            name: term.name.clone(),
            slug,
        })
    }

    /// Assigns terms to a post; already-assigned terms are ignored
    pub fn assign_terms(&self, post_id: PostId, term_ids: &[TermId]) -> AppResult<()> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction()?;
        for term_id in term_ids {
            tx.execute(
                "INSERT OR IGNORE INTO term_relationships (post_id, term_id) VALUES (?1, ?2)",
                params![post_id, term_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let conn = get_connection(&self.pool)?;
        let post = conn
            .query_row(
                &format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS),
                params![id],
                row_to_post,
            )
            .optional()?;
        Ok(post)
    }
}

// src/domain/mod.rs
//
// Domain Root - the document model the repository queries
//
// Posts carry scalar fields, key/value metadata and taxonomy term
// assignments. Nothing in here knows how posts are stored or queried.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod post;
pub mod taxonomy;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use post::{validate_new_post, NewPost, Post, PostId};
pub use taxonomy::{slugify, validate_new_term, NewTerm, Term, TermId};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;

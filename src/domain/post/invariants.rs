use super::entity::NewPost;
use crate::domain::{DomainError, DomainResult};

/// Validates a post before it is handed to a store
pub fn validate_new_post(post: &NewPost) -> DomainResult<()> {
    if post.post_type.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Post type cannot be empty".to_string(),
        ));
    }
    if post.status.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Post status cannot be empty".to_string(),
        ));
    }
    if post.status == super::entity::status::ANY {
        return Err(DomainError::InvariantViolation(
            "'any' is a query pseudo-status and cannot be stored".to_string(),
        ));
    }
    if post.meta.iter().any(|(key, _)| key.trim().is_empty()) {
        return Err(DomainError::InvariantViolation(
            "Meta keys cannot be empty".to_string(),
        ));
    }
    Ok(())
}

// Invariants that must hold for a stored post:
//
// 1. Post type and status are non-empty
// 2. Status is never the `any` pseudo-status
// 3. Meta keys are non-empty; values may be empty
// 4. `date_gmt` is always `date` shifted by the site offset

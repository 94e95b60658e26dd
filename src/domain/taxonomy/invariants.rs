use super::entity::NewTerm;
use crate::domain::{DomainError, DomainResult};

pub fn validate_new_term(term: &NewTerm) -> DomainResult<()> {
    if term.taxonomy.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Taxonomy cannot be empty".to_string(),
        ));
    }
    if term.name.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Term name cannot be empty".to_string(),
        ));
    }
    if term.effective_slug().is_empty() {
        return Err(DomainError::InvariantViolation(format!(
            "Term '{}' does not yield a usable slug",
            term.name
        )));
    }
    Ok(())
}

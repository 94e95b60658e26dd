pub mod entity;
pub mod invariants;

pub use entity::{slugify, NewTerm, Term, TermId};
pub use invariants::validate_new_term;

use serde::{Deserialize, Serialize};

pub type TermId = i64;

/// A term within a taxonomy (e.g. "fiction" in "genre")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTerm {
    pub taxonomy: String,
    pub name: String,
    /// Derived from `name` when empty
    pub slug: String,
}

impl NewTerm {
    pub fn new(taxonomy: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            taxonomy: taxonomy.into(),
            name: name.into(),
            slug: String::new(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    /// The slug to store: the explicit one, or one derived from the name
    pub fn effective_slug(&self) -> String {
        if self.slug.trim().is_empty() {
            slugify(&self.name)
        } else {
            self.slug.clone()
        }
    }
}

/// Lowercases and collapses every run of non-alphanumerics into one `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

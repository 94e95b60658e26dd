use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Store-assigned post identifier
pub type PostId = i64;

/// Well-known post statuses. Custom statuses are plain strings.
pub mod status {
    pub const PUBLISH: &str = "publish";
    pub const DRAFT: &str = "draft";
    pub const FUTURE: &str = "future";
    pub const PENDING: &str = "pending";
    pub const PRIVATE: &str = "private";
    pub const TRASH: &str = "trash";

    /// Pseudo-status accepted by the `status` filter meaning "no restriction"
    pub const ANY: &str = "any";
}

/// A hydrated post record, as returned by the query executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,

    pub post_type: String,

    pub title: String,

    pub content: String,

    pub excerpt: String,

    /// URL-friendly name
    pub slug: String,

    pub status: String,

    pub author: i64,

    /// Parent post, 0 when top-level
    pub parent: PostId,

    pub menu_order: i64,

    /// Publication timestamp in site-local time
    pub date: NaiveDateTime,

    /// Publication timestamp in UTC
    pub date_gmt: NaiveDateTime,
}

/// Input for inserting a post into a store.
///
/// `date` is site-local; the store derives `date_gmt` from the configured
/// UTC offset. When `date` is `None` the store uses the current time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub status: String,
    pub author: i64,
    pub parent: PostId,
    pub menu_order: i64,
    pub date: Option<NaiveDateTime>,
    /// Metadata entries; repeated keys are stored as separate rows
    pub meta: Vec<(String, String)>,
}

impl NewPost {
    /// A published post of the given type with every other field empty
    pub fn new(post_type: impl Into<String>) -> Self {
        Self {
            post_type: post_type.into(),
            title: String::new(),
            content: String::new(),
            excerpt: String::new(),
            slug: String::new(),
            status: status::PUBLISH.to_string(),
            author: 0,
            parent: 0,
            menu_order: 0,
            date: None,
            meta: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_author(mut self, author: i64) -> Self {
        self.author = author;
        self
    }

    pub fn with_parent(mut self, parent: PostId) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_menu_order(mut self, menu_order: i64) -> Self {
        self.menu_order = menu_order;
        self
    }

    pub fn with_date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((key.into(), value.into()));
        self
    }
}

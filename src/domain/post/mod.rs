pub mod entity;
pub mod invariants;

pub use entity::{status, NewPost, Post, PostId};
pub use invariants::validate_new_post;

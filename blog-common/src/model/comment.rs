use crate::model::{Id, post::PostMarker};
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub name: String,
    pub email: String,
    pub body: String,
    pub created: UtcDateTime,
    pub updated: UtcDateTime,
    pub active: bool,
}

/// A validated reader comment that is not yet attached to a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreateComment {
    pub name: String,
    pub email: String,
    pub body: String,
}

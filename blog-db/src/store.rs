use crate::client::Result;
use async_trait::async_trait;
use blog_common::model::{
    Id,
    comment::{Comment, CreateComment},
    post::{Post, PostMarker, PublishDate},
    slug::Slug,
    tag::{Tag, TagMarker},
};
use time::UtcDateTime;

/// Read access to published content plus comment creation.
///
/// Every `*_published_*` method only yields posts that are visible at `now`,
/// see [`Post::is_visible_at`]. Post lists are ordered newest first.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn fetch_tag(&self, slug: &Slug) -> Result<Option<Tag>>;

    async fn count_published_posts(
        &self,
        tag: Option<Id<TagMarker>>,
        now: UtcDateTime,
    ) -> Result<usize>;

    async fn fetch_published_posts(
        &self,
        tag: Option<Id<TagMarker>>,
        now: UtcDateTime,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>>;

    async fn fetch_published_post(
        &self,
        post_id: Id<PostMarker>,
        now: UtcDateTime,
    ) -> Result<Option<Post>>;

    async fn fetch_published_post_by_date(
        &self,
        date: PublishDate,
        slug: &Slug,
        now: UtcDateTime,
    ) -> Result<Option<Post>>;

    /// Published posts sharing tags with `post`, see [`blog_common::similar::rank_similar`].
    async fn fetch_similar_posts(
        &self,
        post: &Post,
        now: UtcDateTime,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// Active comments of a post, oldest first.
    async fn fetch_active_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Stores a new active comment attached to `post_id`.
    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Comment>;
}

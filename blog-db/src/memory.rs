use crate::{
    client::{DbError, Result},
    store::BlogStore,
};
use async_trait::async_trait;
use blog_common::{
    model::{
        BlogSnowflakeGenerator, Id, ModelValidationError,
        comment::{Comment, CommentMarker, CreateComment},
        post::{Author, CreatePost, Post, PostMarker, PostStatus, PublishDate},
        slug::Slug,
        tag::{Tag, TagMarker},
    },
    similar::rank_similar,
    snowflake::{ProcessId, WorkerId},
};
use std::{
    cmp::Reverse,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::{Duration, UtcDateTime};

#[derive(Debug, Default)]
struct Content {
    tags: Vec<Tag>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

impl Content {
    /// Visible posts, newest first.
    fn published(&self, tag: Option<Id<TagMarker>>, now: UtcDateTime) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .posts
            .iter()
            .filter(|post| post.is_visible_at(now))
            .filter(|post| tag.is_none_or(|tag| post.has_tag(tag)))
            .collect();

        posts.sort_by_key(|post| (Reverse(post.publish), Reverse(post.id)));
        posts
    }
}

/// [`BlogStore`] kept in process memory. Used when no database is configured and in tests.
#[derive(Debug)]
pub struct MemoryStore {
    content: Mutex<Content>,
    snowflake_generator: Mutex<BlogSnowflakeGenerator>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            content: Mutex::default(),
            snowflake_generator: Mutex::new(BlogSnowflakeGenerator::new(worker_id, process_id)),
        }
    }

    fn content(&self) -> MutexGuard<'_, Content> {
        self.content.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.into())
    }

    pub fn create_tag(&self, name: &str, slug: Slug) -> Result<Tag> {
        let tag = Tag {
            id: self.next_id()?,
            name: name.to_owned(),
            slug,
        };

        self.content().tags.push(tag.clone());
        Ok(tag)
    }

    pub fn create_post(&self, post: CreatePost) -> Result<Post> {
        let now = UtcDateTime::now();
        let post = Post {
            id: self.next_id()?,
            title: post.title,
            slug: post.slug,
            author: post.author,
            body: post.body,
            publish: post.publish,
            created: now,
            updated: now,
            status: post.status,
            tags: post.tags,
        };

        self.content().posts.push(post.clone());
        Ok(post)
    }

    /// Moderation hook, returns whether the comment exists.
    pub fn set_comment_active(&self, comment_id: Id<CommentMarker>, active: bool) -> bool {
        self.content()
            .comments
            .iter_mut()
            .find(|comment| comment.id == comment_id)
            .map(|comment| comment.active = active)
            .is_some()
    }

    /// Fills the store with a few posts so a fresh development server has something to show.
    pub fn seed_sample_content(&self) -> Result<()> {
        let slug = |slug: &str| Slug::new(slug.to_owned()).map_err(ModelValidationError::from);

        let rust = self.create_tag("Rust", slug("rust")?)?;
        let web = self.create_tag("Web", slug("web")?)?;
        let notes = self.create_tag("Notes", slug("notes")?)?;

        let author = Author {
            id: self.next_id()?,
            username: "admin".to_owned(),
        };
        let now = UtcDateTime::now();

        let samples = [
            ("Hello, blog", "hello-blog", vec![notes.clone()], 3),
            ("Serving HTML with axum", "serving-html-with-axum", vec![rust.clone(), web.clone()], 2),
            ("Typed ids", "typed-ids", vec![rust], 1),
            ("Forms without JavaScript", "forms-without-javascript", vec![web, notes], 0),
        ];

        for (title, slug_str, tags, days_ago) in samples {
            self.create_post(CreatePost {
                title: title.to_owned(),
                slug: slug(slug_str)?,
                author: author.clone(),
                body: format!("{title}.\n\nThis post was generated for local development."),
                publish: now - Duration::days(days_ago),
                status: PostStatus::Published,
                tags,
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn fetch_tag(&self, slug: &Slug) -> Result<Option<Tag>> {
        Ok(self
            .content()
            .tags
            .iter()
            .find(|tag| tag.slug == *slug)
            .cloned())
    }

    async fn count_published_posts(
        &self,
        tag: Option<Id<TagMarker>>,
        now: UtcDateTime,
    ) -> Result<usize> {
        Ok(self.content().published(tag, now).len())
    }

    async fn fetch_published_posts(
        &self,
        tag: Option<Id<TagMarker>>,
        now: UtcDateTime,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        Ok(self
            .content()
            .published(tag, now)
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_published_post(
        &self,
        post_id: Id<PostMarker>,
        now: UtcDateTime,
    ) -> Result<Option<Post>> {
        Ok(self
            .content()
            .posts
            .iter()
            .find(|post| post.id == post_id && post.is_visible_at(now))
            .cloned())
    }

    async fn fetch_published_post_by_date(
        &self,
        date: PublishDate,
        slug: &Slug,
        now: UtcDateTime,
    ) -> Result<Option<Post>> {
        Ok(self
            .content()
            .published(None, now)
            .into_iter()
            .find(|post| post.slug == *slug && post.publish_date() == date)
            .cloned())
    }

    async fn fetch_similar_posts(
        &self,
        post: &Post,
        now: UtcDateTime,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let candidates: Vec<Post> = self
            .content()
            .published(None, now)
            .into_iter()
            .cloned()
            .collect();

        Ok(rank_similar(post, candidates, limit))
    }

    async fn fetch_active_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .content()
            .comments
            .iter()
            .filter(|comment| comment.post == post_id && comment.active)
            .cloned()
            .collect();

        comments.sort_by_key(|comment| (comment.created, comment.id));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Comment> {
        let id = self.next_id()?;
        let now = UtcDateTime::now();

        let mut content = self.content();
        if !content.posts.iter().any(|post| post.id == post_id) {
            return Err(DbError::UnknownPost(post_id));
        }

        let comment = Comment {
            id,
            post: post_id,
            name: comment.name.clone(),
            email: comment.email.clone(),
            body: comment.body.clone(),
            created: now,
            updated: now,
            active: true,
        };
        content.comments.push(comment.clone());

        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use crate::{memory::MemoryStore, store::BlogStore};
    use blog_common::{
        model::{
            comment::CreateComment,
            post::{Author, CreatePost, Post, PostStatus},
            slug::Slug,
            tag::Tag,
        },
        snowflake::{ProcessId, WorkerId},
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    fn store() -> MemoryStore {
        MemoryStore::new(WorkerId::new_unchecked(1), ProcessId::new_unchecked(1))
    }

    fn slug(slug: &str) -> Slug {
        Slug::new(slug.to_owned()).unwrap()
    }

    fn post(
        store: &MemoryStore,
        slug_str: &str,
        publish: UtcDateTime,
        status: PostStatus,
        tags: &[&Tag],
    ) -> Post {
        store
            .create_post(CreatePost {
                title: slug_str.to_owned(),
                slug: slug(slug_str),
                author: Author::default(),
                body: String::new(),
                publish,
                status,
                tags: tags.iter().copied().cloned().collect(),
            })
            .unwrap()
    }

    fn slugs(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.slug.get()).collect()
    }

    #[tokio::test]
    async fn only_visible_posts_are_listed() {
        let store = store();
        let now = utc_datetime!(2024-06-01 12:00);
        let rust = store.create_tag("Rust", slug("rust")).unwrap();

        post(&store, "old", now - Duration::days(2), PostStatus::Published, &[&rust]);
        post(&store, "new", now - Duration::days(1), PostStatus::Published, &[]);
        post(&store, "draft", now - Duration::days(1), PostStatus::Draft, &[&rust]);
        post(&store, "future", now + Duration::days(1), PostStatus::Published, &[&rust]);

        assert_eq!(store.count_published_posts(None, now).await.unwrap(), 2);
        let all = store.fetch_published_posts(None, now, 0, 10).await.unwrap();
        assert_eq!(slugs(&all), ["new", "old"]);

        let tagged = store
            .fetch_published_posts(Some(rust.id), now, 0, 10)
            .await
            .unwrap();
        assert_eq!(slugs(&tagged), ["old"]);
        assert_eq!(store.count_published_posts(Some(rust.id), now).await.unwrap(), 1);

        let second = store.fetch_published_posts(None, now, 1, 1).await.unwrap();
        assert_eq!(slugs(&second), ["old"]);
    }

    #[tokio::test]
    async fn lookup_by_date_and_id() {
        let store = store();
        let now = utc_datetime!(2024-06-01 12:00);
        let published = post(
            &store,
            "hello",
            utc_datetime!(2024-05-04 23:30),
            PostStatus::Published,
            &[],
        );
        let draft = post(&store, "draft", now, PostStatus::Draft, &[]);

        let found = store
            .fetch_published_post_by_date(published.publish_date(), &slug("hello"), now)
            .await
            .unwrap();
        assert_eq!(found.map(|post| post.id), Some(published.id));

        let mut wrong_day = published.publish_date();
        wrong_day.day = 5;
        let missing = store
            .fetch_published_post_by_date(wrong_day, &slug("hello"), now)
            .await
            .unwrap();
        assert!(missing.is_none());

        assert!(store.fetch_published_post(published.id, now).await.unwrap().is_some());
        assert!(store.fetch_published_post(draft.id, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn comments_are_created_active_and_filtered() {
        let store = store();
        let now = UtcDateTime::now();
        let post = post(&store, "post", now, PostStatus::Published, &[]);
        let comment = CreateComment {
            name: "Ann".to_owned(),
            email: "ann@example.com".to_owned(),
            body: "Nice".to_owned(),
        };

        let first = store.create_comment(post.id, &comment).await.unwrap();
        let second = store.create_comment(post.id, &comment).await.unwrap();
        assert!(first.active);
        assert_eq!(first.post, post.id);

        assert!(store.set_comment_active(first.id, false));
        let comments = store.fetch_active_comments(post.id).await.unwrap();
        assert_eq!(comments.iter().map(|c| c.id).collect::<Vec<_>>(), [second.id]);

        assert!(store.create_comment(12345_u64.into(), &comment).await.is_err());
    }

    #[tokio::test]
    async fn similar_posts_skip_invisible_candidates() {
        let store = store();
        let now = utc_datetime!(2024-06-01 12:00);
        let rust = store.create_tag("Rust", slug("rust")).unwrap();

        let source = post(&store, "source", now, PostStatus::Published, &[&rust]);
        post(&store, "sibling", now - Duration::days(1), PostStatus::Published, &[&rust]);
        post(&store, "hidden", now - Duration::days(1), PostStatus::Draft, &[&rust]);

        let similar = store.fetch_similar_posts(&source, now, 4).await.unwrap();
        assert_eq!(slugs(&similar), ["sibling"]);
    }

    #[test]
    fn sample_content_is_published() {
        let store = store();
        store.seed_sample_content().unwrap();
        assert_eq!(store.content().posts.len(), 4);
        assert_eq!(store.content().tags.len(), 3);
    }
}

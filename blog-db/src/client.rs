use crate::{
    record::{CommentRecord, PostRecord, PostTagRecord, TagRecord, to_db_time},
    store::BlogStore,
};
use async_trait::async_trait;
use blog_common::{
    model::{
        BlogSnowflakeGenerator, Id, ModelValidationError,
        comment::{Comment, CreateComment},
        post::{Post, PostMarker, PostStatus, PublishDate},
        slug::Slug,
        tag::{Tag, TagMarker},
    },
    snowflake::{ProcessId, SnowflakeTimestampFromDateTimeError, WorkerId},
};
use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions, query_as, query_scalar};
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use time::UtcDateTime;
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimestampFromDateTimeError),
    #[error("Post with id {0} does not exist")]
    UnknownPost(Id<PostMarker>),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

macro_rules! select_posts {
    () => {
        "
        SELECT
            posts.post_snowflake,
            posts.title,
            posts.slug,
            posts.body,
            posts.publish,
            posts.created,
            posts.updated,
            posts.status,
            users.user_snowflake,
            users.username
        FROM
            blog.posts JOIN users.users ON users.user_snowflake = posts.user_snowflake
        "
    };
}

const MAX_CONNECTIONS: u32 = 10;

const PUBLISHED: &str = PostStatus::Published.as_str();

fn to_db_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// [`BlogStore`] backed by PostgreSQL, see `migrations/` for the schema.
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<BlogSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = Mutex::new(BlogSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn attach_tags(&self, records: Vec<PostRecord>) -> Result<Vec<Post>> {
        let post_snowflakes: Vec<i64> = records.iter().map(|r| r.post_snowflake).collect();

        let tag_records = query_as::<_, PostTagRecord>(
            "
            SELECT
                post_tags.post_snowflake,
                tags.tag_snowflake,
                tags.name,
                tags.slug
            FROM
                blog.post_tags JOIN blog.tags ON tags.tag_snowflake = post_tags.tag_snowflake
            WHERE
                post_tags.post_snowflake = ANY($1)
            ORDER BY
                tags.name
            ",
        )
        .bind(&post_snowflakes)
        .fetch_all(&self.pool)
        .await?;

        let mut tags_by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
        for record in tag_records {
            tags_by_post
                .entry(record.post_snowflake)
                .or_default()
                .push(Tag::try_from(record.tag)?);
        }

        let posts: Vec<Post> = records
            .into_iter()
            .map(|record| {
                let tags = tags_by_post
                    .remove(&record.post_snowflake)
                    .unwrap_or_default();
                record.into_post(tags)
            })
            .collect::<Result<_, ModelValidationError>>()?;

        Ok(posts)
    }

    async fn attach_tags_one(&self, record: Option<PostRecord>) -> Result<Option<Post>> {
        match record {
            Some(record) => Ok(self.attach_tags(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BlogStore for DbClient {
    async fn fetch_tag(&self, slug: &Slug) -> Result<Option<Tag>> {
        let record = query_as::<_, TagRecord>(
            "
            SELECT
                tags.tag_snowflake,
                tags.name,
                tags.slug
            FROM
                blog.tags
            WHERE
                tags.slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let tag = record.map(Tag::try_from).transpose()?;
        Ok(tag)
    }

    async fn count_published_posts(
        &self,
        tag: Option<Id<TagMarker>>,
        now: UtcDateTime,
    ) -> Result<usize> {
        let count = query_scalar::<_, i64>(
            "
            SELECT
                COUNT(*)
            FROM
                blog.posts
            WHERE
                posts.status = $1
                AND posts.publish <= $2
                AND (
                    $3::BIGINT IS NULL
                    OR EXISTS (
                        SELECT 1 FROM blog.post_tags
                        WHERE post_tags.post_snowflake = posts.post_snowflake
                            AND post_tags.tag_snowflake = $3
                    )
                )
            ",
        )
        .bind(PUBLISHED)
        .bind(to_db_time(now))
        .bind(tag.map(Id::as_db))
        .fetch_one(&self.pool)
        .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn fetch_published_posts(
        &self,
        tag: Option<Id<TagMarker>>,
        now: UtcDateTime,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "
            WHERE
                posts.status = $1
                AND posts.publish <= $2
                AND (
                    $3::BIGINT IS NULL
                    OR EXISTS (
                        SELECT 1 FROM blog.post_tags
                        WHERE post_tags.post_snowflake = posts.post_snowflake
                            AND post_tags.tag_snowflake = $3
                    )
                )
            ORDER BY
                posts.publish DESC,
                posts.post_snowflake DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(PUBLISHED)
        .bind(to_db_time(now))
        .bind(tag.map(Id::as_db))
        .bind(to_db_count(limit))
        .bind(to_db_count(offset))
        .fetch_all(&self.pool)
        .await?;

        self.attach_tags(records).await
    }

    async fn fetch_published_post(
        &self,
        post_id: Id<PostMarker>,
        now: UtcDateTime,
    ) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "
            WHERE
                posts.post_snowflake = $1
                AND posts.status = $2
                AND posts.publish <= $3
            "
        ))
        .bind(post_id.as_db())
        .bind(PUBLISHED)
        .bind(to_db_time(now))
        .fetch_optional(&self.pool)
        .await?;

        self.attach_tags_one(record).await
    }

    async fn fetch_published_post_by_date(
        &self,
        date: PublishDate,
        slug: &Slug,
        now: UtcDateTime,
    ) -> Result<Option<Post>> {
        let Some((day_start, day_end)) = date.day_range() else {
            return Ok(None);
        };

        let record = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "
            WHERE
                posts.slug = $1
                AND posts.publish >= $2
                AND posts.publish < $3
                AND posts.status = $4
                AND posts.publish <= $5
            ORDER BY
                posts.publish DESC
            LIMIT 1
            "
        ))
        .bind(slug.get())
        .bind(to_db_time(day_start))
        .bind(to_db_time(day_end))
        .bind(PUBLISHED)
        .bind(to_db_time(now))
        .fetch_optional(&self.pool)
        .await?;

        self.attach_tags_one(record).await
    }

    async fn fetch_similar_posts(
        &self,
        post: &Post,
        now: UtcDateTime,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let tag_snowflakes: Vec<i64> = post.tags.iter().map(|tag| tag.id.as_db()).collect();
        if tag_snowflakes.is_empty() {
            return Ok(Vec::new());
        }

        let records = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "
                JOIN blog.post_tags ON post_tags.post_snowflake = posts.post_snowflake
            WHERE
                post_tags.tag_snowflake = ANY($1)
                AND posts.post_snowflake <> $2
                AND posts.status = $3
                AND posts.publish <= $4
            GROUP BY
                posts.post_snowflake,
                users.user_snowflake
            ORDER BY
                COUNT(*) DESC,
                posts.publish DESC,
                posts.post_snowflake DESC
            LIMIT $5
            "
        ))
        .bind(&tag_snowflakes)
        .bind(post.id.as_db())
        .bind(PUBLISHED)
        .bind(to_db_time(now))
        .bind(to_db_count(limit))
        .fetch_all(&self.pool)
        .await?;

        self.attach_tags(records).await
    }

    async fn fetch_active_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.name,
                comments.email,
                comments.body,
                comments.created,
                comments.updated,
                comments.active
            FROM
                blog.comments
            WHERE
                comments.post_snowflake = $1
                AND comments.active
            ORDER BY
                comments.created,
                comments.comment_snowflake
            ",
        )
        .bind(post_id.as_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Comment::from).collect())
    }

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Comment> {
        let now = UtcDateTime::now();
        let comment_snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_at(now)?;

        let record = query_as::<_, CommentRecord>(
            "
            INSERT INTO blog.comments
                (comment_snowflake, post_snowflake, name, email, body, created, updated, active)
            VALUES ($1, $2, $3, $4, $5, $6, $6, TRUE)
            RETURNING
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.name,
                comments.email,
                comments.body,
                comments.created,
                comments.updated,
                comments.active
            ",
        )
        .bind(comment_snowflake.get().cast_signed())
        .bind(post_id.as_db())
        .bind(&comment.name)
        .bind(&comment.email)
        .bind(&comment.body)
        .bind(to_db_time(now))
        .fetch_one(&self.pool)
        .await?;

        debug!(comment = %comment_snowflake, post = %post_id, "Inserted comment");
        Ok(record.into())
    }
}

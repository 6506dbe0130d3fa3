use blog_common::model::{
    Id, ModelValidationError,
    comment::Comment,
    post::{Author, Post},
    slug::Slug,
    tag::Tag,
};
use sqlx::FromRow;
use time::{PrimitiveDateTime, UtcDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub publish: PrimitiveDateTime,
    pub created: PrimitiveDateTime,
    pub updated: PrimitiveDateTime,
    pub status: String,
    pub user_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct TagRecord {
    pub tag_snowflake: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostTagRecord {
    pub post_snowflake: i64,
    #[sqlx(flatten)]
    pub tag: TagRecord,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub name: String,
    pub email: String,
    pub body: String,
    pub created: PrimitiveDateTime,
    pub updated: PrimitiveDateTime,
    pub active: bool,
}

/// `TIMESTAMP` columns hold UTC wall-clock time.
pub(crate) fn to_db_time(time: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(time.date(), time.time())
}

impl PostRecord {
    pub fn into_post(self, tags: Vec<Tag>) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: Id::from_db(self.post_snowflake),
            title: self.title,
            slug: Slug::new(self.slug)?,
            author: Author {
                id: Id::from_db(self.user_snowflake),
                username: self.username,
            },
            body: self.body,
            publish: self.publish.as_utc(),
            created: self.created.as_utc(),
            updated: self.updated.as_utc(),
            status: self.status.parse()?,
            tags,
        })
    }
}

impl TryFrom<TagRecord> for Tag {
    type Error = ModelValidationError;

    fn try_from(value: TagRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.tag_snowflake),
            name: value.name,
            slug: Slug::new(value.slug)?,
        })
    }
}

impl From<CommentRecord> for Comment {
    fn from(value: CommentRecord) -> Self {
        Self {
            id: Id::from_db(value.comment_snowflake),
            post: Id::from_db(value.post_snowflake),
            name: value.name,
            email: value.email,
            body: value.body,
            created: value.created.as_utc(),
            updated: value.updated.as_utc(),
            active: value.active,
        }
    }
}

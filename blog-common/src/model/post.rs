use crate::model::{
    Id,
    slug::Slug,
    tag::{Tag, TagMarker},
};
use std::str::FromStr;
use thiserror::Error;
use time::{Date, Month, UtcDateTime};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthorMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown post status: {0:?}")]
pub struct InvalidPostStatusError(String);

impl PostStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl FromStr for PostStatus {
    type Err = InvalidPostStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(InvalidPostStatusError(other.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Author {
    pub id: Id<AuthorMarker>,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: String,
    pub slug: Slug,
    pub author: Author,
    pub body: String,
    pub publish: UtcDateTime,
    pub created: UtcDateTime,
    pub updated: UtcDateTime,
    pub status: PostStatus,
    pub tags: Vec<Tag>,
}

/// A post as written in the admin interface, before it has an id.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub title: String,
    pub slug: Slug,
    pub author: Author,
    pub body: String,
    pub publish: UtcDateTime,
    pub status: PostStatus,
    pub tags: Vec<Tag>,
}

impl Post {
    /// Whether readers may see the post at `now`.
    #[must_use]
    pub fn is_visible_at(&self, now: UtcDateTime) -> bool {
        self.status == PostStatus::Published && self.publish <= now
    }

    #[must_use]
    pub fn publish_date(&self) -> PublishDate {
        PublishDate::of(self.publish)
    }

    /// Canonical path of the post, e.g. `/2024/01/05/hello-world`.
    #[must_use]
    pub fn absolute_url(&self) -> String {
        let PublishDate { year, month, day } = self.publish_date();
        format!("/{year}/{month:02}/{day:02}/{}", self.slug)
    }

    #[must_use]
    pub fn publish_display(&self) -> String {
        format!(
            "{} {}, {}",
            self.publish.month(),
            self.publish.day(),
            self.publish.year()
        )
    }

    #[must_use]
    pub fn has_tag(&self, tag: Id<TagMarker>) -> bool {
        self.tags.iter().any(|t| t.id == tag)
    }
}

/// The calendar day (UTC) a post is published on, as used in its URL.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PublishDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl PublishDate {
    #[must_use]
    pub fn of(time: UtcDateTime) -> Self {
        Self {
            year: time.year(),
            month: u8::from(time.month()),
            day: time.day(),
        }
    }

    /// Half-open range `[start, end)` of instants on this day, `None` for impossible dates.
    #[must_use]
    pub fn day_range(self) -> Option<(UtcDateTime, UtcDateTime)> {
        let month = Month::try_from(self.month).ok()?;
        let date = Date::from_calendar_date(self.year, month, self.day).ok()?;
        let next = date.next_day()?;

        Some((date.midnight().as_utc(), next.midnight().as_utc()))
    }
}

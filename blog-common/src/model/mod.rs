pub mod comment;
pub mod post;
pub mod slug;
pub mod tag;

use crate::{
    model::{post::InvalidPostStatusError, slug::InvalidSlugError},
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Slug(#[from] InvalidSlugError),
    #[error(transparent)]
    PostStatus(#[from] InvalidPostStatusError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct BlogEpoch;
impl Epoch for BlogEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2020-01-01 00:00);
}

pub type BlogSnowflake = Snowflake<BlogEpoch>;
pub type BlogSnowflakeGenerator = SnowflakeGenerator<BlogEpoch>;

/// Typed id of a model, `Marker` is one of the `*Marker` structs next to the model.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(BlogSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: BlogSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> BlogSnowflake {
        self.0
    }

    /// The id as stored in `BIGINT` columns.
    #[must_use]
    pub fn as_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<BlogSnowflake> for Id<Marker> {
    fn from(value: BlogSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(BlogSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

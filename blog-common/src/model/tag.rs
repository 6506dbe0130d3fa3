use crate::model::{Id, slug::Slug};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TagMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Tag {
    pub id: Id<TagMarker>,
    pub name: String,
    pub slug: Slug,
}

impl Tag {
    /// Path of the post listing filtered by this tag.
    #[must_use]
    pub fn absolute_url(&self) -> String {
        format!("/tag/{}", self.slug)
    }
}

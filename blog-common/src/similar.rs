use crate::model::post::Post;
use std::cmp::Reverse;

/// How many similar posts are shown below a post.
pub const SIMILAR_POSTS_LIMIT: usize = 4;

#[must_use]
pub fn shared_tag_count(source: &Post, candidate: &Post) -> usize {
    candidate
        .tags
        .iter()
        .filter(|tag| source.has_tag(tag.id))
        .count()
}

/// Picks at most `limit` posts sharing a tag with `source`.
///
/// More shared tags rank first, then newer publish dates. The sort is stable, so
/// remaining ties keep the order of `candidates`. `source` itself is never returned.
#[must_use]
pub fn rank_similar(
    source: &Post,
    candidates: impl IntoIterator<Item = Post>,
    limit: usize,
) -> Vec<Post> {
    let mut ranked: Vec<(usize, Post)> = candidates
        .into_iter()
        .filter(|candidate| candidate.id != source.id)
        .map(|candidate| (shared_tag_count(source, &candidate), candidate))
        .filter(|(shared, _)| *shared > 0)
        .collect();

    ranked.sort_by_key(|(shared, candidate)| (Reverse(*shared), Reverse(candidate.publish)));
    ranked.truncate(limit);

    ranked.into_iter().map(|(_, post)| post).collect()
}

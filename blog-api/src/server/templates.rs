use crate::server::forms::{BoundForm, CommentForm, SharePostForm};
use askama::Template;
use blog_common::{
    model::{comment::Comment, post::Post, tag::Tag},
    pagination::Page,
};

#[derive(Template)]
#[template(path = "blog/post/list.html")]
pub struct PostList {
    pub page: Page<Post>,
    pub tag: Option<Tag>,
    previous_url: Option<String>,
    next_url: Option<String>,
}

impl PostList {
    pub fn new(page: Page<Post>, tag: Option<Tag>) -> Self {
        let base = tag.as_ref().map_or_else(|| "/".to_owned(), Tag::absolute_url);
        let page_url = |number: usize| format!("{base}?page={number}");

        Self {
            previous_url: page.previous_number().map(page_url),
            next_url: page.next_number().map(page_url),
            page,
            tag,
        }
    }
}

#[derive(Template)]
#[template(path = "blog/post/detail.html")]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
    pub comment_form: BoundForm<CommentForm>,
    pub similar_posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "blog/post/share.html")]
pub struct PostShare {
    pub post: Post,
    pub form: BoundForm<SharePostForm>,
    pub sent: bool,
}

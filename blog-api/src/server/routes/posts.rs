use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    extract::{Form, Query},
    forms::{BoundForm, CommentForm},
    response::View,
    templates::{PostDetail, PostList},
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use blog_common::{
    model::{
        comment::CreateComment,
        post::{Post, PublishDate},
        slug::Slug,
        tag::Tag,
    },
    pagination::Paginator,
    similar::SIMILAR_POSTS_LIMIT,
};
use blog_db::BlogStore;
use serde::Deserialize;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_get(list_posts_by_tag)
        .typed_get(post_detail)
        .typed_post(create_comment)
}

/// The `page` query parameter. The last one wins when it is repeated.
fn requested_page(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .rev()
        .find(|(name, _)| name == "page")
        .map(|(_, value)| value.as_str())
}

#[derive(TypedPath)]
#[typed_path("/")]
struct ListPostsPath;

async fn list_posts(
    ListPostsPath: ListPostsPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(settings): State<Arc<Settings>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<View<PostList>> {
    list_page(store.as_ref(), &settings, None, requested_page(&params)).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tag/{tag_slug}", rejection(ServerError))]
struct ListPostsByTagPath {
    tag_slug: Slug,
}

async fn list_posts_by_tag(
    ListPostsByTagPath { tag_slug }: ListPostsByTagPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(settings): State<Arc<Settings>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<View<PostList>> {
    let tag = store
        .fetch_tag(&tag_slug)
        .await?
        .ok_or(ServerError::TagNotFound(tag_slug))?;

    list_page(store.as_ref(), &settings, Some(tag), requested_page(&params)).await
}

async fn list_page(
    store: &dyn BlogStore,
    settings: &Settings,
    tag: Option<Tag>,
    requested_page: Option<&str>,
) -> Result<View<PostList>> {
    let now = UtcDateTime::now();
    let tag_id = tag.as_ref().map(|tag| tag.id);

    let count = store.count_published_posts(tag_id, now).await?;
    let paginator = Paginator::new(count, settings.posts_per_page);
    let number = paginator.resolve(requested_page);

    let posts = store
        .fetch_published_posts(
            tag_id,
            now,
            paginator.offset(number),
            paginator.per_page().get(),
        )
        .await?;

    Ok(View(PostList::new(paginator.page(number, posts), tag)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{year}/{month}/{day}/{slug}", rejection(ServerError))]
struct PostDetailPath {
    year: i32,
    month: u8,
    day: u8,
    slug: Slug,
}

impl PostDetailPath {
    async fn fetch_post(self, store: &dyn BlogStore) -> Result<Post> {
        let Self {
            year,
            month,
            day,
            slug,
        } = self;
        let date = PublishDate { year, month, day };

        store
            .fetch_published_post_by_date(date, &slug, UtcDateTime::now())
            .await?
            .ok_or(ServerError::PostByDateNotFound { date, slug })
    }
}

async fn post_detail(
    path: PostDetailPath,
    State(store): State<Arc<dyn BlogStore>>,
) -> Result<View<PostDetail>> {
    let post = path.fetch_post(store.as_ref()).await?;

    render_detail(store.as_ref(), post, BoundForm::default()).await
}

async fn create_comment(
    path: PostDetailPath,
    State(store): State<Arc<dyn BlogStore>>,
    form: Result<Form<CommentForm>>,
) -> Result<Response> {
    let post = path.fetch_post(store.as_ref()).await?;
    let Form(form) = form?;

    let form = BoundForm::bind(form);
    if !form.is_valid() {
        debug!(post = %post.id, errors = ?form.errors, "Rejected comment");
        let view = render_detail(store.as_ref(), post, form).await?;
        return Ok(view.into_response());
    }

    let comment = store
        .create_comment(post.id, &CreateComment::from(form.data))
        .await?;
    info!(comment = %comment.id, post = %post.id, "Created comment");

    Ok(Redirect::to(&post.absolute_url()).into_response())
}

async fn render_detail(
    store: &dyn BlogStore,
    post: Post,
    comment_form: BoundForm<CommentForm>,
) -> Result<View<PostDetail>> {
    let comments = store.fetch_active_comments(post.id).await?;
    let similar_posts = store
        .fetch_similar_posts(&post, UtcDateTime::now(), SIMILAR_POSTS_LIMIT)
        .await?;

    Ok(View(PostDetail {
        post,
        comments,
        comment_form,
        similar_posts,
    }))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{TestApp, expect};
    use axum::http::{Method, StatusCode, header};
    use blog_common::model::post::PostStatus;
    use blog_db::BlogStore;
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    fn titles(body: &str) -> Vec<&str> {
        body.match_indices("<h2><a href=")
            .filter_map(|(index, _)| {
                let rest = &body[index..];
                let start = rest.find("\">")? + 2;
                let end = rest.find("</a>")?;
                Some(&rest[start..end])
            })
            .collect()
    }

    #[tokio::test]
    async fn lists_published_posts_newest_first() {
        let app = TestApp::new();
        let now = UtcDateTime::now();
        app.post("older", now - Duration::days(2), &[]);
        app.post("newer", now - Duration::days(1), &[]);
        app.post_with_status("draft", now - Duration::days(1), PostStatus::Draft, &[]);
        app.post("future", now + Duration::days(1), &[]);

        let body = expect(app.get("/").await, StatusCode::OK).await;
        assert_eq!(titles(&body), ["Title of newer", "Title of older"]);
        assert!(body.contains("Page 1 of 1."));
    }

    #[tokio::test]
    async fn tag_filter_only_shows_tagged_posts() {
        let app = TestApp::new();
        let now = UtcDateTime::now();
        let rust = app.tag("rust");
        let web = app.tag("web");
        app.post("rusty", now - Duration::hours(3), &[&rust]);
        app.post("webby", now - Duration::hours(2), &[&web]);
        app.post("both", now - Duration::hours(1), &[&rust, &web]);
        app.post_with_status("rust-draft", now, PostStatus::Draft, &[&rust]);

        let body = expect(app.get("/tag/rust").await, StatusCode::OK).await;
        assert_eq!(titles(&body), ["Title of both", "Title of rusty"]);
        assert!(body.contains("Posts tagged with \"rust\""));

        expect(app.get("/tag/unknown").await, StatusCode::NOT_FOUND).await;
    }

    #[tokio::test]
    async fn page_numbers_are_clamped() {
        let app = TestApp::new();
        let now = UtcDateTime::now();
        for day in 1..=7 {
            app.post(&format!("post-{day}"), now - Duration::days(day), &[]);
        }

        let first = expect(app.get("/").await, StatusCode::OK).await;
        assert_eq!(titles(&first), ["Title of post-1", "Title of post-2", "Title of post-3"]);
        assert!(first.contains("Page 1 of 3."));
        assert!(first.contains("href=\"/?page=2\""));

        for page in ["abc", "", "1.5"] {
            let body = expect(app.get(&format!("/?page={page}")).await, StatusCode::OK).await;
            assert_eq!(titles(&body), titles(&first), "{page}");
        }

        let last = expect(app.get("/?page=3").await, StatusCode::OK).await;
        assert_eq!(titles(&last), ["Title of post-7"]);
        assert!(last.contains("href=\"/?page=2\""));

        for page in ["4", "999", "0", "-2"] {
            let body = expect(app.get(&format!("/?page={page}")).await, StatusCode::OK).await;
            assert_eq!(titles(&body), titles(&last), "{page}");
        }
    }

    #[tokio::test]
    async fn repeated_page_parameter_uses_the_last_one() {
        let app = TestApp::new();
        let now = UtcDateTime::now();
        let rust = app.tag("rust");
        for day in 1..=7 {
            app.post(&format!("post-{day}"), now - Duration::days(day), &[&rust]);
        }

        let body = expect(app.get("/?page=2&page=3").await, StatusCode::OK).await;
        assert_eq!(titles(&body), ["Title of post-7"]);
        assert!(body.contains("Page 3 of 3."));

        let body = expect(app.get("/tag/rust?page=3&page=2").await, StatusCode::OK).await;
        assert_eq!(titles(&body), ["Title of post-4", "Title of post-5", "Title of post-6"]);

        let body = expect(app.get("/?page=3&page=abc&utm_source=feed").await, StatusCode::OK).await;
        assert_eq!(titles(&body), ["Title of post-1", "Title of post-2", "Title of post-3"]);
    }

    #[tokio::test]
    async fn empty_blog_has_one_empty_page() {
        let app = TestApp::new();

        let body = expect(app.get("/?page=5").await, StatusCode::OK).await;
        assert!(titles(&body).is_empty());
        assert!(body.contains("Page 1 of 1."));
    }

    #[tokio::test]
    async fn detail_shows_post_with_active_comments_and_similar_posts() {
        let app = TestApp::new();
        let python = app.tag("python");
        let django = app.tag("django");
        let cooking = app.tag("cooking");
        let p1 = app.post("p1", utc_datetime!(2024-01-01 10:00), &[&python, &django]);
        app.post("p2", utc_datetime!(2024-02-01 10:00), &[&python]);
        app.post("p3", utc_datetime!(2024-03-01 10:00), &[&cooking]);

        let visible = app
            .store
            .create_comment(p1.id, &Default::default())
            .await
            .unwrap();
        let hidden = app
            .store
            .create_comment(p1.id, &Default::default())
            .await
            .unwrap();
        assert!(app.store.set_comment_active(hidden.id, false));

        let body = expect(app.get("/2024/01/01/p1").await, StatusCode::OK).await;
        assert!(body.contains("<h2>Title of p1</h2>"));
        assert!(body.contains("1 comment</h2>"));
        assert!(body.contains("href=\"/2024/02/01/p2\""));
        assert!(!body.contains("href=\"/2024/03/01/p3\""));
        assert!(body.contains(&format!("/posts/{}/share", p1.id)));
        assert_ne!(visible.id, hidden.id);
    }

    #[tokio::test]
    async fn detail_of_invisible_posts_is_not_found() {
        let app = TestApp::new();
        let now = UtcDateTime::now();
        let draft = app.post_with_status("draft", now - Duration::days(1), PostStatus::Draft, &[]);
        let future = app.post("future", now + Duration::days(1), &[]);
        let published = app.post("published", utc_datetime!(2024-05-04 12:00), &[]);

        for uri in [
            draft.absolute_url(),
            future.absolute_url(),
            "/2024/05/05/published".to_owned(),
            "/2024/13/04/published".to_owned(),
            "/2024/05/04/missing".to_owned(),
            "/year/05/04/published".to_owned(),
        ] {
            expect(app.get(&uri).await, StatusCode::NOT_FOUND).await;
        }

        expect(app.get(&published.absolute_url()).await, StatusCode::OK).await;
    }

    #[tokio::test]
    async fn valid_comment_redirects_to_post() {
        let app = TestApp::new();
        let post = app.post("hello", utc_datetime!(2024-01-05 09:00), &[]);

        let response = app
            .post_form(
                "/2024/01/05/hello",
                "name=+Ann+&email=ann%40example.com&body=Great+post",
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/2024/01/05/hello");

        let comments = app.store.fetch_active_comments(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].name, "Ann");
        assert_eq!(comments[0].body, "Great post");
        assert!(comments[0].active);
    }

    #[tokio::test]
    async fn invalid_comment_rerenders_with_errors() {
        let app = TestApp::new();
        let post = app.post("hello", utc_datetime!(2024-01-05 09:00), &[]);

        let body = expect(
            app.post_form("/2024/01/05/hello", "name=Ann&email=ann%40example.com&body=")
                .await,
            StatusCode::OK,
        )
        .await;

        assert!(body.contains("class=\"errorlist\""));
        assert!(body.contains("value=\"Ann\""));
        assert!(body.contains("value=\"ann@example.com\""));
        assert!(app.store.fetch_active_comments(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let app = TestApp::new();

        let response = app
            .post_form("/2024/01/05/nothing", "name=Ann&email=ann%40example.com&body=Hi")
            .await;
        expect(response, StatusCode::NOT_FOUND).await;
    }

    #[tokio::test]
    async fn bodyless_comment_on_missing_post_is_not_found() {
        let app = TestApp::new();

        let response = app.send(Method::POST, "/2024/01/05/nothing", None).await;
        let body = expect(response, StatusCode::NOT_FOUND).await;
        assert_eq!(body, r#"{"status":404}"#);
    }

    #[tokio::test]
    async fn comment_needs_form_body() {
        let app = TestApp::new();
        app.post("hello", utc_datetime!(2024-01-05 09:00), &[]);

        let response = app.send(Method::POST, "/2024/01/05/hello", None).await;
        let body = expect(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(body, r#"{"status":400}"#);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let app = TestApp::new();

        let body = expect(app.get("/no/such/route/here/really").await, StatusCode::NOT_FOUND).await;
        assert_eq!(body, r#"{"status":404}"#);
    }
}

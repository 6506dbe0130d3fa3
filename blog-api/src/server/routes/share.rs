use crate::{
    mail::{Mailer, OutgoingMail},
    server::{
        Result, ServerError, ServerRouter, Settings,
        extract::{Form, RequestHost},
        forms::{BoundForm, SharePostForm},
        response::View,
        templates::PostShare,
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use blog_common::model::{
    Id,
    post::{Post, PostMarker},
};
use blog_db::BlogStore;
use serde::Deserialize;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(share_form)
        .typed_post(share_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/share", rejection(ServerError))]
struct SharePostPath {
    id: Id<PostMarker>,
}

impl SharePostPath {
    async fn fetch_post(self, store: &dyn BlogStore) -> Result<Post> {
        store
            .fetch_published_post(self.id, UtcDateTime::now())
            .await?
            .ok_or(ServerError::PostByIdNotFound(self.id))
    }
}

async fn share_form(
    path: SharePostPath,
    State(store): State<Arc<dyn BlogStore>>,
) -> Result<View<PostShare>> {
    let post = path.fetch_post(store.as_ref()).await?;

    Ok(View(PostShare {
        post,
        form: BoundForm::default(),
        sent: false,
    }))
}

async fn share_post(
    path: SharePostPath,
    State(store): State<Arc<dyn BlogStore>>,
    State(mailer): State<Arc<dyn Mailer>>,
    State(settings): State<Arc<Settings>>,
    host: Result<RequestHost>,
    form: Result<Form<SharePostForm>>,
) -> Result<View<PostShare>> {
    let post = path.fetch_post(store.as_ref()).await?;
    let host = host?;
    let Form(form) = form?;

    let form = BoundForm::bind(form);
    if !form.is_valid() {
        debug!(post = %post.id, errors = ?form.errors, "Rejected recommendation");
        return Ok(View(PostShare {
            post,
            form,
            sent: false,
        }));
    }

    let post_url = host.absolute_url(&settings.site_scheme, &post.absolute_url());
    let mail = recommendation(&post, &post_url, &form.data, &settings.mail_from);
    mailer.send(&mail).await?;
    info!(post = %post.id, to = %mail.to, "Sent recommendation");

    Ok(View(PostShare {
        post,
        form,
        sent: true,
    }))
}

fn recommendation(post: &Post, post_url: &str, form: &SharePostForm, from: &str) -> OutgoingMail {
    let SharePostForm {
        name,
        email,
        to,
        comments,
    } = form;
    let title = &post.title;

    OutgoingMail {
        from: from.to_owned(),
        to: to.clone(),
        subject: format!("{name} ({email}) recommends you reading \"{title}\""),
        body: format!("Read \"{title}\" at {post_url}\n\n{name}'s comments: {comments}"),
    }
}

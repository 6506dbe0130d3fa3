use crate::{
    mail::{MailError, Mailer, OutgoingMail},
    server::{ServerState, Settings, routes},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use blog_common::{
    model::{
        post::{Author, CreatePost, Post, PostStatus},
        slug::Slug,
        tag::Tag,
    },
    snowflake::{ProcessId, WorkerId},
};
use blog_db::MemoryStore;
use lettre::Address;
use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};
use time::UtcDateTime;
use tower::ServiceExt;

pub const HOST: &str = "blog.test";

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        mail.to_message()?;

        if self.fail {
            return Err(MailError::Address {
                address: mail.to.clone(),
                source: "unreachable".parse::<Address>().unwrap_err(),
            });
        }

        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(RecordingMailer::default())
    }

    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        let store = Arc::new(MemoryStore::new(
            WorkerId::new_unchecked(1),
            ProcessId::new_unchecked(1),
        ));
        let mailer = Arc::new(mailer);
        let settings = Settings {
            posts_per_page: NonZeroUsize::new(3).unwrap(),
            site_scheme: "https".to_owned(),
            mail_from: "admin@myblog.com".to_owned(),
            allowed_hosts: vec![HOST.to_owned()],
        };

        let router = routes().with_state(ServerState {
            store: store.clone(),
            mailer: mailer.clone(),
            settings: Arc::new(settings),
        });

        Self {
            store,
            mailer,
            router,
        }
    }

    pub fn tag(&self, slug: &str) -> Tag {
        self.store
            .create_tag(slug, Slug::new(slug.to_owned()).unwrap())
            .unwrap()
    }

    pub fn post(&self, slug: &str, publish: UtcDateTime, tags: &[&Tag]) -> Post {
        self.post_with_status(slug, publish, PostStatus::Published, tags)
    }

    pub fn post_with_status(
        &self,
        slug: &str,
        publish: UtcDateTime,
        status: PostStatus,
        tags: &[&Tag],
    ) -> Post {
        self.store
            .create_post(CreatePost {
                title: format!("Title of {slug}"),
                slug: Slug::new(slug.to_owned()).unwrap(),
                author: Author {
                    id: 1_u64.into(),
                    username: "admin".to_owned(),
                },
                body: format!("Body of {slug}"),
                publish,
                status,
                tags: tags.iter().copied().cloned().collect(),
            })
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> Response {
        self.send(Method::POST, uri, Some(form)).await
    }

    pub async fn send(&self, method: Method, uri: &str, form: Option<&str>) -> Response {
        self.send_to_host(HOST, method, uri, form).await
    }

    pub async fn send_to_host(
        &self,
        host: &str,
        method: Method,
        uri: &str,
        form: Option<&str>,
    ) -> Response {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, host);

        let body = match form {
            Some(form) => {
                request = request.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(form.to_owned())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Asserts the status and returns the body.
pub async fn expect(response: Response, status: StatusCode) -> String {
    assert_eq!(response.status(), status);
    body_text(response).await
}

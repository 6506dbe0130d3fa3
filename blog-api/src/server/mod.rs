use crate::mail::{MailError, Mailer};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{FormRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use blog_common::model::{
    Id,
    post::{PostMarker, PublishDate},
    slug::Slug,
};
use blog_db::{BlogStore, DbError};
use response::Json;
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, sync::Arc};
use thiserror::Error;
use tracing::error;

mod extract;
mod forms;
mod response;
mod routes;
mod templates;

#[cfg(test)]
mod test_support;

pub type ServerRouter = Router<ServerState>;

/// Site-wide settings the handlers need.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    pub posts_per_page: NonZeroUsize,
    /// Scheme of absolute links in outgoing mail, the host comes from the request.
    pub site_scheme: String,
    pub mail_from: String,
    /// Host names the site answers to. `*` allows any host, a leading `.` allows subdomains.
    pub allowed_hosts: Vec<String>,
}

impl Settings {
    #[must_use]
    pub fn is_allowed_host(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();

        self.allowed_hosts.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            match allowed.strip_prefix('.') {
                _ if allowed == "*" => true,
                Some(domain) => hostname == domain || hostname.ends_with(&allowed),
                None => hostname == allowed,
            }
        })
    }
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn BlogStore>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<Settings>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Host header was missing or invalid: {0}")]
    InvalidHostHeader(TypedHeaderRejection),
    #[error("Host {0:?} is not in the allowed hosts")]
    DisallowedHost(String),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Template could not be rendered: {0}")]
    Template(#[from] askama::Error),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Post {slug} published on {date:?} was not found.")]
    PostByDateNotFound { date: PublishDate, slug: Slug },
    #[error("Tag {0} was not found.")]
    TagNotFound(Slug),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::PostByDateNotFound { .. }
            | ServerError::TagNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::QueryRejection(_)
            | ServerError::FormRejection(_)
            | ServerError::InvalidHostHeader(_)
            | ServerError::DisallowedHost(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Template(_)
            | ServerError::Database(_)
            | ServerError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}

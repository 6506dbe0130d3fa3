use crate::server::ServerError;
use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// An HTML page rendered from an askama template.
#[derive(Debug, Clone, Copy, Default)]
pub struct View<T>(pub T);

impl<T: Template> IntoResponse for View<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => ServerError::Template(err).into_response(),
        }
    }
}

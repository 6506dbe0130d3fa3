use crate::server::{ServerError, Settings};
use axum::{
    Form as AxumForm,
    extract::{FromRef, FromRequest, FromRequestParts, Query as AxumQuery},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::Host;
use std::sync::Arc;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumForm), rejection(ServerError))]
pub struct Form<T>(pub T);

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

type HostHeader = TypedHeader<Host>;

/// The `Host` the client addressed, checked against [`Settings::allowed_hosts`].
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct RequestHost(Host);

impl RequestHost {
    #[must_use]
    pub fn absolute_url(&self, scheme: &str, path: &str) -> String {
        format!("{scheme}://{}{path}", self.0)
    }
}

impl<S> FromRequestParts<S> for RequestHost
where
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(host) = HostHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidHostHeader)?;

        if !Arc::<Settings>::from_ref(state).is_allowed_host(host.hostname()) {
            return Err(ServerError::DisallowedHost(host.to_string()));
        }

        Ok(Self(host))
    }
}

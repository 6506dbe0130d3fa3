use crate::server::ServerRouter;
use axum::Router;

mod posts;
mod share;

pub fn routes() -> ServerRouter {
    Router::new().merge(posts::routes()).merge(share::routes())
}

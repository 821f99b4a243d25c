//! HTTP surface: blog API plus a health probe.

mod blogs;
mod health;
mod middleware;

pub use middleware::{ACTOR_HEADER, RequestContext};

use std::sync::Arc;

use axum::{
    Router,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};

use crate::application::blogs::BlogService;
use crate::cache::{InvalidationCoordinator, KvStore};
use crate::infra::db::DocumentStore;

#[derive(Clone)]
pub struct HttpState {
    pub blogs: Arc<BlogService<DocumentStore>>,
    pub documents: DocumentStore,
    pub store: Arc<dyn KvStore>,
    pub invalidation: InvalidationCoordinator,
}

pub fn build_router(state: HttpState) -> Router {
    // Writes clear the actor's cache group once the handler has produced its response.
    let create_blog = blogs::create_blog.layer(from_fn_with_state(
        state.invalidation.clone(),
        middleware::clean_cache,
    ));

    let blog_routes = Router::new()
        .route("/api/blogs", get(blogs::list_blogs).post(create_blog))
        .route("/api/blogs/{id}", get(blogs::get_blog))
        .layer(from_fn(middleware::require_actor));

    let health_routes = Router::new().route("/_health", get(health::health));

    blog_routes
        .merge(health_routes)
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

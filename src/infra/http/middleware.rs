use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::application::error::{AppError, ErrorReport};
use crate::cache::{GroupKey, InvalidationCoordinator};
use crate::domain::actor::Actor;

/// Set by the session layer in front of this service.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let actor = response
            .extensions()
            .get::<Actor>()
            .map(|actor| actor.id().to_string())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "cachet::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                actor = actor,
                "request failed",
            );
        } else {
            warn!(
                target = "cachet::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                actor = actor,
                "client request error",
            );
        }
    }

    response
}

/// Resolve the [`Actor`] from [`ACTOR_HEADER`] or reject with 401.
pub async fn require_actor(mut request: Request<Body>, next: Next) -> Response {
    let actor = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Actor::new(value).ok());

    let Some(actor) = actor else {
        let mut response = AppError::Unauthenticated.into_response();
        if let Some(report) = response.extensions_mut().get_mut::<ErrorReport>() {
            report.messages.push(format!("missing or blank `{ACTOR_HEADER}` header"));
        }
        return response;
    };

    request.extensions_mut().insert(actor.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(actor);
    response
}

/// Run the wrapped write handler, then clear the actor's cache group.
///
/// The response is returned as soon as the handler finishes; the group
/// delete runs in the background whatever the status was.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn clean_cache(
    State(coordinator): State<InvalidationCoordinator>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(actor) = request.extensions().get::<Actor>().cloned() else {
        return next.run(request).await;
    };

    let (response, _invalidation) = coordinator
        .run(GroupKey::for_actor(&actor), next.run(request))
        .await;
    response
}

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::domain::actor::Actor;
use crate::domain::blogs::{Blog, NewBlog};

use super::HttpState;

pub(super) async fn list_blogs(
    State(state): State<HttpState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Blog>>, AppError> {
    let blogs = state.blogs.list_for(&actor).await?;
    Ok(Json(blogs))
}

pub(super) async fn get_blog(
    State(state): State<HttpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Blog>, AppError> {
    let blog = state.blogs.get_for(&actor, id).await?;
    Ok(Json(blog))
}

pub(super) async fn create_blog(
    State(state): State<HttpState>,
    Extension(actor): Extension<Actor>,
    Json(draft): Json<NewBlog>,
) -> Result<(StatusCode, Json<Blog>), AppError> {
    let blog = state.blogs.create_for(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

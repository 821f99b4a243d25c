//! Blog reads and writes for one actor.
//!
//! Reads are cached under the actor's group. Writes are not invalidated
//! here; the HTTP layer wraps write routes with the invalidation middleware.

use tracing::info;
use uuid::Uuid;

use crate::application::documents::{DocumentWriter, QueryEngine};
use crate::application::error::AppError;
use crate::application::query::{Filter, Model, Query};
use crate::cache::{CacheOptions, CachedQueryEngine};
use crate::domain::actor::Actor;
use crate::domain::blogs::{Blog, NewBlog};

impl Model for Blog {
    const COLLECTION: &'static str = "blogs";
}

pub struct BlogService<E> {
    documents: CachedQueryEngine<E>,
}

impl<E> BlogService<E>
where
    E: QueryEngine + DocumentWriter,
{
    pub fn new(documents: CachedQueryEngine<E>) -> Self {
        Self { documents }
    }

    pub async fn list_for(&self, actor: &Actor) -> Result<Vec<Blog>, AppError> {
        let query = Query::<Blog>::find(Filter::new().eq("_user", actor.id()))
            .cache(CacheOptions::for_actor(actor));
        let output = self.documents.execute(&query).await?;
        Ok(output.into_many())
    }

    pub async fn get_for(&self, actor: &Actor, id: Uuid) -> Result<Blog, AppError> {
        let query = Query::<Blog>::find_one(
            Filter::new()
                .eq("_user", actor.id())
                .eq("_id", id.to_string()),
        )
        .cache(CacheOptions::for_actor(actor));
        self.documents
            .execute(&query)
            .await?
            .into_one()
            .ok_or(AppError::NotFound)
    }

    pub async fn create_for(&self, actor: &Actor, draft: NewBlog) -> Result<Blog, AppError> {
        let blog = Blog::new(actor, draft)?;
        self.documents.inner().insert(&blog).await?;
        info!(
            target = "cachet::application::blogs",
            blog_id = %blog.id,
            user = actor.id(),
            "blog created"
        );
        Ok(blog)
    }
}

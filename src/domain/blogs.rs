//! Blog entries owned by an actor.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::actor::Actor;
use super::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 200;

/// Field names follow the document layout: `_id` and `_user` are matched by
/// filters, so renaming them changes every cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "_user")]
    pub user: String,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Blog {
    pub fn new(owner: &Actor, draft: NewBlog) -> Result<Self, DomainError> {
        let draft = draft.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            user: owner.id().to_string(),
            title: draft.title,
            content: draft.content,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBlog {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl NewBlog {
    fn validate(self) -> Result<Self, DomainError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "title must be at most {TITLE_MAX_CHARS} characters"
            )));
        }
        Ok(Self {
            title,
            content: self.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn actor() -> Actor {
        Actor::new("u1").expect("actor")
    }

    #[test]
    fn new_blog_is_owned_by_actor() {
        let blog = Blog::new(
            &actor(),
            NewBlog {
                title: "  Hello ".to_string(),
                content: "body".to_string(),
            },
        )
        .expect("valid blog");

        assert_eq!(blog.user, "u1");
        assert_eq!(blog.title, "Hello");
    }

    #[test]
    fn rejects_blank_and_long_titles() {
        let blank = NewBlog {
            title: " ".to_string(),
            content: String::new(),
        };
        assert!(Blog::new(&actor(), blank).is_err());

        let long = NewBlog {
            title: "x".repeat(TITLE_MAX_CHARS + 1),
            content: String::new(),
        };
        assert!(Blog::new(&actor(), long).is_err());
    }

    #[test]
    fn serializes_with_document_field_names() {
        let blog = Blog::new(
            &actor(),
            NewBlog {
                title: "A".to_string(),
                content: String::new(),
            },
        )
        .expect("valid blog");

        let value = serde_json::to_value(&blog).expect("serialize");
        assert_eq!(value["_user"], json!("u1"));
        assert_eq!(value["_id"], json!(blog.id.to_string()));

        let back: Blog = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, blog);
    }
}

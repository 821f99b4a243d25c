//! The authenticated party a request acts for.

use super::error::DomainError;

/// Identity resolved by the session layer in front of this service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("actor id must not be empty"));
        }
        Ok(Self {
            id: trimmed.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_identity() {
        let actor = Actor::new("  u1 ").expect("valid actor");
        assert_eq!(actor.id(), "u1");
    }

    #[test]
    fn rejects_blank_identity() {
        assert!(matches!(
            Actor::new("   "),
            Err(DomainError::Validation { .. })
        ));
    }
}

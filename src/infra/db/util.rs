use crate::application::documents::EngineError;

pub fn map_sqlx_error(err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            EngineError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            EngineError::Unavailable(db.message().to_string())
        }
        sqlx::Error::Database(db) => EngineError::Query(db.message().to_string()),
        other => EngineError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            EngineError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            EngineError::Unavailable(_)
        ));
    }

    #[test]
    fn other_failures_are_query_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            EngineError::Query(_)
        ));
    }
}

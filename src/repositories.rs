pub mod documents;
pub mod earnings;
pub mod referrals;
pub mod settings;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },
    #[error("Stale write on {collection}/{id}: expected version {expected}, found {found}")]
    StaleWrite {
        collection: String,
        id: String,
        expected: i64,
        found: i64,
    },
    #[error("Malformed document {collection}/{id}: {reason}")]
    MalformedDocument {
        collection: String,
        id: String,
        reason: String,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        RepositoryError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn malformed(collection: &str, id: &str, reason: impl ToString) -> Self {
        RepositoryError::MalformedDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

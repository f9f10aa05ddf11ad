use thiserror::Error;

pub mod audit;

pub use audit::{AuditLogQuery, SqlAuditRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

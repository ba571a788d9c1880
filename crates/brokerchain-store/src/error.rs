use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lead not found: {0}")]
    LeadNotFound(String),

    #[error("supplier not found: {0}")]
    SupplierNotFound(String),

    #[error("crawl source not found: {0}")]
    SourceNotFound(String),

    #[error("crawl source already registered: {0}")]
    DuplicateSource(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to replace store file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("{0}")]
    Other(String),
}

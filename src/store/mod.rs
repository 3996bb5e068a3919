pub mod postgrest;
pub mod query;

pub use postgrest::PostgrestStore;
pub use query::{Cond, Order, Query};

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Unexpected store response shape: {0}")]
    UnexpectedBody(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Invalid store URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Row-store collaborator contract.
///
/// The engine only ever needs filtered reads and merge-by-key writes; there
/// is no delete and no multi-statement transaction. `upsert` overwrites every
/// column present in `row`, so callers must always resend full rows; the
/// store does not support partial-field updates.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Insert, or merge when `on_conflict` names the key columns (comma
    /// separated). Returns the resulting row.
    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: Option<&str>,
    ) -> Result<Value, StoreError>;
}

/// Reject anything that is not a plain snake_case identifier before it is
/// spliced into a URL path or filter key.
pub(crate) fn validate_ident(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ident_accepts_snake_case() {
        assert!(validate_ident("attendance_worklogs").is_ok());
        assert!(validate_ident("work_date").is_ok());
    }

    #[test]
    fn test_validate_ident_rejects_injection() {
        assert!(validate_ident("").is_err());
        assert!(validate_ident("users;drop").is_err());
        assert!(validate_ident("a b").is_err());
        assert!(validate_ident("tbl?select=*").is_err());
    }
}

//! Error handling for b3futures
//!
//! Defines the error taxonomy shared by the collector, the query layer and
//! the analysis tool, and establishes a unified Result type using anyhow for
//! context chaining and error propagation.

use thiserror::Error;

/// Core error types for collection, storage and analysis
#[derive(Error, Debug)]
pub enum FuturesError {
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("sync error: {0}")]
    Sync(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for b3futures operations
pub type Result<T> = anyhow::Result<T>;

/// Find the first `FuturesError` in an error chain, if any.
pub fn classify(err: &anyhow::Error) -> Option<&FuturesError> {
    err.chain().find_map(|cause| cause.downcast_ref::<FuturesError>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = FuturesError::Store("disk full".to_string());
        assert_eq!(err.to_string(), "store error: disk full");
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: Result<()> = Err(anyhow::Error::from(FuturesError::Fetch(
            "connection refused".to_string(),
        )))
        .context("failed to download settlement page");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to download settlement page"));
        assert!(format!("{:?}", err).contains("connection refused"));
    }

    #[test]
    fn test_classify_finds_typed_cause_under_context() {
        use anyhow::Context;
        let result: Result<()> = Err(anyhow::Error::from(FuturesError::Parse(
            "no rows".to_string(),
        )))
        .context("collect");
        let err = result.unwrap_err();
        assert!(matches!(classify(&err), Some(FuturesError::Parse(_))));

        let plain = anyhow::anyhow!("untyped");
        assert!(classify(&plain).is_none());
    }

    #[test]
    fn test_error_variant_prefixes() {
        assert!(FuturesError::Query("x".into()).to_string().starts_with("query error"));
        assert!(FuturesError::Sync("x".into()).to_string().starts_with("sync error"));
        assert!(FuturesError::Config("x".into()).to_string().starts_with("config error"));
    }
}

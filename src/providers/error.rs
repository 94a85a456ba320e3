use thiserror::Error;

/// Typed failure of a single provider adapter call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("No data near the requested coordinate")]
    EmptyResult,

    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),
}

impl FetchError {
    /// Whether a sibling endpoint of the same provider family is worth trying
    #[must_use]
    pub fn is_retryable_with_variant(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkFailure(_) | FetchError::ParseFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

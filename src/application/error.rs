use thiserror::Error;

use crate::{
    config::LoadError, domain::error::DomainError, infra::error::InfraError,
    infra::snapshot::SnapshotError,
};

/// Top-level failure of the `folio` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("snapshot could not be loaded: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    Request(String),
    #[error("resource not found")]
    NotFound,
}

impl AppError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Domain(_) => 2,
            AppError::NotFound => 4,
            AppError::Snapshot(_) => 3,
            AppError::Infra(_) | AppError::Request(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_failure_classes() {
        assert_eq!(AppError::NotFound.exit_code(), 4);
        assert_eq!(
            AppError::from(DomainError::validation("title", "empty")).exit_code(),
            2
        );
        assert_eq!(AppError::request("boom").exit_code(), 1);
    }
}

use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::admin::AdminError,
    cache::StoreError,
    config::LoadError,
    infra::{error::InfraError, settings_store::SettingsStoreError},
};

/// An error flattened into its chain of messages, outermost first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn render(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        Self::Infra(InfraError::Store(error))
    }
}

impl From<SettingsStoreError> for AppError {
    fn from(error: SettingsStoreError) -> Self {
        Self::Infra(InfraError::Settings(error))
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status for the command-line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 78,
            AppError::Validation(_) => 65,
            AppError::Admin(AdminError::Unauthorized | AdminError::InvalidToken) => 77,
            AppError::Admin(AdminError::Settings(_))
            | AppError::Infra(_)
            | AppError::Unexpected(_) => 74,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

use ndsom_core::{HttpError, PersistenceError, PipelineError, RetryExhausted};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("HTTP client: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Persistence(#[from] RetryExhausted<PersistenceError>),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Command(_) => 2,
            Self::Pipeline(PipelineError::Schema(_)) => 3,
            Self::Http(_) | Self::Pipeline(PipelineError::Transport(_)) => 4,
            Self::Pipeline(PipelineError::Persistence(_)) | Self::Persistence(_) => 5,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndsom_core::SchemaError;

    #[test]
    fn failure_kinds_have_distinct_exit_codes() {
        let schema = CliError::from(PipelineError::Schema(SchemaError::MissingKey {
            key: "result1".to_string(),
        }));
        let persistence = CliError::from(RetryExhausted::new(
            "purge_all",
            3,
            PersistenceError::QueryRejected("x".to_string()),
        ));

        assert_eq!(schema.exit_code(), 3);
        assert_eq!(persistence.exit_code(), 5);
        assert_eq!(CliError::Command("confirm".to_string()).exit_code(), 2);
        assert_eq!(CliError::from(HttpError::new("tls backend")).exit_code(), 4);
    }
}

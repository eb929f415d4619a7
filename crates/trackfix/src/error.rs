use std::path::PathBuf;

use thiserror::Error;
use trackfix_runtime::EditError;
use trackfix_store::StoreError;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl CliError {
    /// Process exit code: 2 for operator mistakes, 3 for persistence
    /// failures, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::Script { .. } | Self::InvalidArgument { .. } | Self::InvalidConfig(_) => 2,
            Self::Edit(error) if error.is_user_error() => 2,
            Self::Edit(EditError::Store(_)) | Self::Store(_) => 3,
            _ => 1,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn script(line: usize, message: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CliError;
    use trackfix_runtime::EditError;
    use trackfix_store::StoreError;

    #[test]
    fn user_mistakes_exit_with_two() {
        assert_eq!(CliError::from(EditError::NoSelection).exit_code(), 2);
        assert_eq!(CliError::script(3, "unknown command").exit_code(), 2);
        assert_eq!(CliError::invalid("bad").exit_code(), 2);
    }

    #[test]
    fn persistence_failures_exit_with_three() {
        assert_eq!(CliError::from(StoreError::Disconnected).exit_code(), 3);
        assert_eq!(
            CliError::from(EditError::Store(StoreError::Disconnected)).exit_code(),
            3
        );
    }

    #[test]
    fn script_errors_name_the_line() {
        assert_eq!(CliError::script(7, "boom").to_string(), "line 7: boom");
    }
}

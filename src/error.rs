use std::path::PathBuf;
use std::sync::Arc;

/// Everything that can go wrong between the hosting API and a query result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("dataset acquisition failed: {0}")]
    Acquisition(String),

    /// The primary tabular file is absent after acquisition.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unknown column '{column}'{}", hint_suffix(.hint))]
    UnknownColumn {
        column: String,
        hint: Option<String>,
    },

    #[error("source file is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("invalid dataset identifier '{0}' (expected owner/dataset-slug)")]
    InvalidDatasetId(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An acquisition error observed by a caller that waited on another
    /// caller's in-flight acquisition.
    #[error(transparent)]
    Shared(Arc<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(" (did you mean '{h}'?)"),
        None => String::new(),
    }
}

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Unwrap an error handed out by the snapshot cache.
    pub fn from_shared(err: Arc<Error>) -> Self {
        match Arc::try_unwrap(err) {
            Ok(err) => err,
            Err(shared) => Error::Shared(shared),
        }
    }

    fn inner(&self) -> &Error {
        match self {
            Error::Shared(inner) => inner.inner(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.inner(), Error::NotFound(_))
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.inner(), Error::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_message_includes_hint() {
        let err = Error::UnknownColumn {
            column: "make".into(),
            hint: Some("Make".into()),
        };
        assert_eq!(err.to_string(), "unknown column 'make' (did you mean 'Make'?)");

        let err = Error::UnknownColumn {
            column: "Colour".into(),
            hint: None,
        };
        assert_eq!(err.to_string(), "unknown column 'Colour'");
    }

    #[test]
    fn shared_errors_keep_their_kind() {
        let shared = Arc::new(Error::NotFound(PathBuf::from("database.csv")));
        let _keep = Arc::clone(&shared);
        let err = Error::from_shared(shared);
        assert!(matches!(err, Error::Shared(_)));
        assert!(err.is_not_found());
        assert!(!err.is_authentication());

        let sole = Arc::new(Error::Authentication("401".into()));
        let err = Error::from_shared(sole);
        assert!(matches!(err, Error::Authentication(_)));
        assert!(err.is_authentication());
    }
}

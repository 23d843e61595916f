use crate::passes::{PassError, PassKind};
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for ngpass operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Tried to find bootstrap code in {main}, but found {found} statically analyzable \
         call sites. Specify either statically analyzable bootstrap code or an explicit \
         entryModule."
    )]
    AmbiguousBootstrap { main: PathBuf, found: usize },

    #[error(
        "Could not trace `{symbol}` from {main} to a class declaration. Specify an explicit \
         entryModule."
    )]
    UnresolvedSymbol { main: PathBuf, symbol: String },

    #[error("{pass} pass failed on {file}: {source}")]
    PassInternal {
        pass: PassKind,
        file: PathBuf,
        #[source]
        source: PassError,
    },

    #[error("Invalid source map for {path}: {message}")]
    SourceMap { path: PathBuf, message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Stable machine-readable code for JSON output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AmbiguousBootstrap { .. } => "NGPASS_AMBIGUOUS_BOOTSTRAP",
            Self::UnresolvedSymbol { .. } => "NGPASS_UNRESOLVED_SYMBOL",
            Self::PassInternal { .. } => "NGPASS_PASS_INTERNAL",
            Self::SourceMap { .. } => "NGPASS_SOURCE_MAP",
            Self::FileNotFound { .. } => "NGPASS_FILE_NOT_FOUND",
            Self::Io(_) => "NGPASS_IO",
            Self::ConfigRead { .. } => "NGPASS_CONFIG_READ",
            Self::ConfigParse { .. } => "NGPASS_CONFIG_PARSE",
        }
    }

    pub(crate) fn source_map(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SourceMap {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_bootstrap_mentions_remedy() {
        let err = Error::AmbiguousBootstrap {
            main: PathBuf::from("src/main.ts"),
            found: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("src/main.ts"));
        assert!(msg.contains("found 2"));
        assert!(msg.contains("entryModule"));
        assert_eq!(err.code(), "NGPASS_AMBIGUOUS_BOOTSTRAP");
    }

    #[test]
    fn test_pass_internal_chains_source() {
        let err = Error::PassInternal {
            pass: PassKind::Closurize,
            file: PathBuf::from("/p/a.ts"),
            source: PassError::new("NGPASS_TEST", "boom"),
        };
        assert!(err.to_string().starts_with("closurize pass failed on /p/a.ts"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("NGPASS_TEST: boom"));
    }
}

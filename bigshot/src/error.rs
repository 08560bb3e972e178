//! Error types for the bigshot library

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Coarse classification of a [`BigshotError`].
///
/// Every failure aborts the whole requested operation; the category only tells
/// the caller whether retrying with different input could help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or missing parameters, unreadable source image
    Configuration,
    /// A render worker failed, panicked, or the pool timed out
    Computation,
    /// Filesystem or archive data errors
    Io,
}

#[derive(Debug, Error)]
pub enum BigshotError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read source image {}: {source}", path.display())]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid archive: {0}")]
    Archive(String),
}

impl BigshotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BigshotError::Config(_) | BigshotError::UnreadableSource { .. } => {
                ErrorCategory::Configuration
            }
            BigshotError::Computation(_) => ErrorCategory::Computation,
            BigshotError::Io { .. } | BigshotError::Encode { .. } | BigshotError::Archive(_) => {
                ErrorCategory::Io
            }
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        BigshotError::Config(msg.into())
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        BigshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BigshotError>;

/// Attach a path to `std::io::Result` errors, like `anyhow::Context` but typed.
pub(crate) trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| BigshotError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            BigshotError::config("oversampling < 1").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            BigshotError::Computation("timed out".into()).category(),
            ErrorCategory::Computation
        );
        let io = std::fs::read("/definitely/not/here").at(Path::new("/definitely/not/here"));
        let err = io.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Io);
        assert!(err.to_string().contains("/definitely/not/here"));
    }
}

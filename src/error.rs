//! Unified error type for vary operations.
//!
//! Defines [`VaryError`], the single error enum every engine returns. Messages
//! are designed to be self-contained: each variant says what went wrong and,
//! where a command can fix it, which one.
//!
//! User cancellation is a variant, not a message — interactive paths bubble
//! [`VaryError::Cancelled`] up to `main`, which exits cleanly without noise.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// VaryError
// ---------------------------------------------------------------------------

/// Unified error type for workspace, engine and merge operations.
#[derive(Debug)]
pub enum VaryError {
    /// The `.features/` workspace directory does not exist.
    WorkspaceMissing,

    /// The current directory is not inside a git repository.
    NotAGitRepository,

    /// A delimiter operation used an extension the registry cannot accept.
    InvalidExtension {
        /// The offending extension.
        extension: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A conflict block contained neither a current nor an incoming section.
    InvalidConflict,

    /// A block region's literal content could not be located in its file,
    /// so no deterministic ID could be assigned.
    RegionWithoutMatchLine {
        /// Path of the file holding the region.
        path: PathBuf,
        /// Feature name of the region.
        name: String,
    },

    /// The path has no version base yet.
    NotABase {
        /// The repository-relative path.
        path: PathBuf,
    },

    /// The path already has a version base.
    AlreadyABase {
        /// The repository-relative path.
        path: PathBuf,
    },

    /// A version feature with this name already exists for the path.
    FeatureExists {
        /// The duplicate feature name.
        name: String,
        /// The repository-relative path.
        path: PathBuf,
    },

    /// No feature with this name exists anywhere in the workspace.
    FeatureNotFound {
        /// The unknown feature name.
        name: String,
    },

    /// A feature name failed validation.
    InvalidFeatureName {
        /// The rejected name.
        name: String,
        /// Why the name is invalid.
        reason: String,
    },

    /// A state value is not valid for the targeted engine.
    InvalidState {
        /// The rejected state token.
        state: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The working-tree index holds no snapshot for the requested feature set.
    StateNotFound {
        /// Canonical `[id, id, ...]` form of the missing key.
        key: String,
    },

    /// The working-tree index holds no usable prefix for a build.
    PrefixNotFound,

    /// A named preset does not exist.
    PresetNotFound {
        /// The unknown preset name.
        name: String,
    },

    /// A preset with this name already exists.
    PresetExists {
        /// The duplicate preset name.
        name: String,
    },

    /// A git command failed.
    Git {
        /// The command that was run (e.g. `"git diff --name-only"`).
        command: String,
        /// Captured stderr from git.
        stderr: String,
    },

    /// A persistent JSON file could not be parsed or written.
    Json {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser/serializer detail.
        detail: String,
    },

    /// An I/O error during a store or engine operation.
    Io(std::io::Error),

    /// The user cancelled an interactive step. Not a failure.
    Cancelled,
}

/// Convenience alias used across the library.
pub type Result<T> = std::result::Result<T, VaryError>;

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for VaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkspaceMissing => {
                write!(f, "workspace not found.\n  To fix: run `vary init`")
            }
            Self::NotAGitRepository => {
                write!(
                    f,
                    "not inside a git repository.\n  To fix: run vary from within a repository, or `git init` first"
                )
            }
            Self::InvalidExtension { extension, reason } => {
                write!(f, "invalid extension '{extension}': {reason}")
            }
            Self::InvalidConflict => {
                write!(
                    f,
                    "invalid conflict: the block has neither current nor incoming content"
                )
            }
            Self::RegionWithoutMatchLine { path, name } => {
                write!(
                    f,
                    "could not locate the region for feature '{name}' inside '{}'; the file changed while syncing",
                    path.display()
                )
            }
            Self::NotABase { path } => {
                write!(
                    f,
                    "'{}' is not a version base.\n  To fix: run `vary versions base` on it first",
                    path.display()
                )
            }
            Self::AlreadyABase { path } => {
                write!(f, "'{}' is already a version base", path.display())
            }
            Self::FeatureExists { name, path } => {
                write!(
                    f,
                    "feature '{name}' already exists for '{}'",
                    path.display()
                )
            }
            Self::FeatureNotFound { name } => {
                write!(
                    f,
                    "feature '{name}' does not exist.\n  To fix: check `vary report` for known features"
                )
            }
            Self::InvalidFeatureName { name, reason } => {
                write!(f, "invalid feature name '{name}': {reason}")
            }
            Self::InvalidState { state, reason } => {
                write!(f, "invalid state '{state}': {reason}")
            }
            Self::StateNotFound { key } => {
                write!(f, "no saved snapshot for the feature set {key}")
            }
            Self::PrefixNotFound => {
                write!(f, "no stored state shares a prefix with the requested feature set")
            }
            Self::PresetNotFound { name } => {
                write!(f, "preset '{name}' does not exist")
            }
            Self::PresetExists { name } => {
                write!(f, "preset '{name}' already exists")
            }
            Self::Git { command, stderr } => {
                write!(f, "git command failed: {command}")?;
                if !stderr.is_empty() {
                    write!(f, "\n  stderr: {stderr}")?;
                }
                Ok(())
            }
            Self::Json { path, detail } => {
                write!(f, "malformed JSON in '{}': {detail}", path.display())
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error / From
// ---------------------------------------------------------------------------

impl std::error::Error for VaryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VaryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl VaryError {
    /// Returns `true` for user cancellation, which callers treat as a clean
    /// exit rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_workspace_missing_mentions_init() {
        let msg = format!("{}", VaryError::WorkspaceMissing);
        assert!(msg.contains("vary init"));
    }

    #[test]
    fn display_not_a_base() {
        let err = VaryError::NotABase {
            path: PathBuf::from("src/app.go"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("src/app.go"));
        assert!(msg.contains("not a version base"));
    }

    #[test]
    fn display_feature_exists() {
        let err = VaryError::FeatureExists {
            name: "dark-mode".to_owned(),
            path: PathBuf::from("ui/theme.css"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("dark-mode"));
        assert!(msg.contains("ui/theme.css"));
    }

    #[test]
    fn display_git_error_with_stderr() {
        let err = VaryError::Git {
            command: "git diff --name-only".to_owned(),
            stderr: "fatal: bad revision".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("git diff --name-only"));
        assert!(msg.contains("fatal: bad revision"));
    }

    #[test]
    fn display_git_error_without_stderr() {
        let err = VaryError::Git {
            command: "git status".to_owned(),
            stderr: String::new(),
        };
        assert!(!format!("{err}").contains("stderr:"));
    }

    #[test]
    fn io_error_has_source() {
        let err = VaryError::Io(std::io::Error::other("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn non_io_error_has_no_source() {
        assert!(std::error::Error::source(&VaryError::InvalidConflict).is_none());
    }

    #[test]
    fn from_io_error() {
        let err: VaryError = std::io::Error::other("nope").into();
        assert!(matches!(err, VaryError::Io(_)));
    }

    #[test]
    fn cancelled_is_cancelled() {
        assert!(VaryError::Cancelled.is_cancelled());
        assert!(!VaryError::WorkspaceMissing.is_cancelled());
    }
}

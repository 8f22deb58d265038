//! Extension → comment-delimiter registry.
//!
//! Block regions are wrapped in the comment markers of their host language.
//! The registry maps file extensions (including the `default` fallback) to a
//! `(start, end)` pair and is persisted as JSON at `.features/delimeters`
//! (the historical spelling is the on-disk contract).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaryError};
use crate::store::FileStore;

/// Key of the fallback entry. Always present in a valid registry.
pub const DEFAULT_KEY: &str = "default";

// ---------------------------------------------------------------------------
// Delimiter
// ---------------------------------------------------------------------------

/// A comment-delimiter pair. `start` carries a trailing space and `end` a
/// leading one so rendered markers never fuse with the surrounding code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiter {
    /// Opening comment marker, e.g. `"// "`.
    pub start: String,
    /// Closing comment marker, e.g. `" //"`.
    pub end: String,
}

impl Delimiter {
    /// Build a delimiter from raw markers, applying the canonical padding:
    /// trim both, then append a space to `start` and prepend one to `end`.
    #[must_use]
    pub fn padded(start: &str, end: &str) -> Self {
        Self {
            start: format!("{} ", start.trim()),
            end: format!(" {}", end.trim()),
        }
    }
}

/// The registry: a total function from extension to delimiter via the
/// `default` entry.
pub type Registry = BTreeMap<String, Delimiter>;

/// The registry shipped by `vary init`.
#[must_use]
pub fn default_registry() -> Registry {
    let mut map = Registry::new();
    for (ext, start, end) in [
        (".xqy", "(:~", "~:)"),
        (".xml", "<!--", "-->"),
        (".html", "<!--", "-->"),
        (".cc", "//", "//"),
        (".cpp", "//", "//"),
        (".go", "//", "//"),
        (".py", "#", "#"),
        (DEFAULT_KEY, "//", "//"),
    ] {
        map.insert(ext.to_owned(), Delimiter::padded(start, end));
    }
    map
}

// ---------------------------------------------------------------------------
// Persistence + operations
// ---------------------------------------------------------------------------

/// Load the registry from `file`.
pub fn load(store: &FileStore, file: &Path) -> Result<Registry> {
    store.read_json(file)
}

/// Delimiter for `path`'s extension, falling back to `default`.
pub fn for_path(registry: &Registry, path: &str) -> Delimiter {
    let ext = Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    registry
        .get(&ext)
        .or_else(|| registry.get(DEFAULT_KEY))
        .cloned()
        .unwrap_or_else(|| Delimiter::padded("//", "//"))
}

/// Insert or replace the delimiter for `extension`.
///
/// # Errors
///
/// [`VaryError::InvalidExtension`] when the extension does not begin with `.`.
pub fn set(
    store: &FileStore,
    file: &Path,
    extension: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    if extension != DEFAULT_KEY && !extension.starts_with('.') {
        return Err(VaryError::InvalidExtension {
            extension: extension.to_owned(),
            reason: "extensions must begin with '.'".to_owned(),
        });
    }
    let mut registry = load(store, file)?;
    registry.insert(extension.to_owned(), Delimiter::padded(start, end));
    store.write_json(file, &registry)
}

/// Remove the delimiter for `extension`.
///
/// # Errors
///
/// [`VaryError::InvalidExtension`] when asked to delete `default` or an
/// extension that is not registered.
pub fn delete(store: &FileStore, file: &Path, extension: &str) -> Result<()> {
    if extension == DEFAULT_KEY {
        return Err(VaryError::InvalidExtension {
            extension: extension.to_owned(),
            reason: "the default delimiter cannot be deleted".to_owned(),
        });
    }
    let mut registry = load(store, file)?;
    if registry.remove(extension).is_none() {
        return Err(VaryError::InvalidExtension {
            extension: extension.to_owned(),
            reason: "no delimiter registered for this extension".to_owned(),
        });
    }
    store.write_json(file, &registry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

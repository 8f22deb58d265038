//! Reversible encoding of repository-relative paths as directory names.
//!
//! Every tracked file gets its own directory under `.features/blocks/` and
//! `.features/versions/`, named by a token derived from the path: separators
//! are substituted with `_SLASH_` / `_BACKSLASH_` so the token is a single
//! valid path component. The mapping is bijective for any path whose bytes do
//! not already contain the substitution strings.

const SLASH_TOKEN: &str = "_SLASH_";
const BACKSLASH_TOKEN: &str = "_BACKSLASH_";

/// Encode a repository-relative path as a single directory-name token.
#[must_use]
pub fn encode(path: &str) -> String {
    path.replace('\\', BACKSLASH_TOKEN).replace('/', SLASH_TOKEN)
}

/// Decode a directory-name token back into the original path.
#[must_use]
pub fn decode(token: &str) -> String {
    token
        .replace(BACKSLASH_TOKEN, "\\")
        .replace(SLASH_TOKEN, "/")
}

/// Replace backslashes with forward slashes. Display and glob matching only;
/// never applied to paths handed to the filesystem.
#[must_use]
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

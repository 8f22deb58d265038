//! Mutex-guarded file store shared by both engines.
//!
//! All paths handed to the store are absolute; the engines resolve
//! repository-relative paths before calling in. Every mutating operation is
//! serialised through one process-wide lock so stacked read-modify-write
//! helpers cannot interleave.
//!
//! Checksums are SHA-256 hex. The stdlib hasher is not stable across
//! releases, and checksums land on disk in the working-tree index, so a
//! deterministic algorithm is required.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::error::{Result, VaryError};

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// File-system access point for both engines. Construct one per process and
/// pass it by reference; the internal lock serialises mutations.
#[derive(Debug, Default)]
pub struct FileStore {
    lock: Mutex<()>,
}

impl FileStore {
    /// Create a new store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `src` over `dst`, creating parent directories as needed.
    pub fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        Ok(())
    }

    /// Read a file's bytes.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    /// Read a file as UTF-8 text (lossy on invalid sequences).
    pub fn read_string(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write bytes, creating parent directories as needed.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Whether a file or directory exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Remove a file. Missing files are not an error.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove a directory and everything beneath it. Missing directories are
    /// not an error.
    pub fn remove_dir(&self, path: &Path) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a directory and its ancestors.
    pub fn create_dir(&self, path: &Path) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// SHA-256 hex digest of a file's bytes.
    pub fn checksum(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        Ok(checksum_bytes(&bytes))
    }

    /// List the entries of a directory, excluding any whose basename begins
    /// with `_` (the `_wt/` / `_path` convention). Sorted by file name.
    pub fn list_dir(&self, dir: &Path) -> Result<Vec<std::path::PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('_') {
                continue;
            }
            out.push(entry.path());
        }
        out.sort();
        Ok(out)
    }

    /// Read and deserialize a JSON file.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|err| VaryError::Json {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })
    }

    /// Serialize and write a JSON file.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value).map_err(|err| VaryError::Json {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        self.write(path, &json)
    }

    /// Replace the 1-indexed inclusive line range `[start..=end]` of `path`
    /// with `new_lines`. Used by the conflict resolver to splice resolved
    /// blocks back into the merge scratch file.
    pub fn replace_lines(
        &self,
        path: &Path,
        start: usize,
        end: usize,
        new_lines: &[String],
    ) -> Result<()> {
        let text = self.read_string(path)?;
        let had_trailing_newline = text.ends_with('\n');
        let lines: Vec<&str> = text.lines().collect();
        if start == 0 || start > end || end > lines.len() {
            return Err(VaryError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("line range {start}..{end} out of bounds for {}", path.display()),
            )));
        }

        let mut out: Vec<&str> = Vec::with_capacity(lines.len());
        out.extend_from_slice(&lines[..start - 1]);
        out.extend(new_lines.iter().map(String::as_str));
        out.extend_from_slice(&lines[end..]);

        let mut joined = out.join("\n");
        if had_trailing_newline {
            joined.push('\n');
        }
        self.write(path, joined.as_bytes())
    }
}

/// SHA-256 hex digest of a byte slice.
#[must_use]
pub fn checksum_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Deterministic short identifier: SHA-256 over the concatenated seeds,
/// truncated to 25 hex characters. Region and feature IDs must be
/// recomputable from file contents, so nothing time- or randomness-based is
/// ever mixed in.
#[must_use]
pub fn generate_id(seeds: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed.as_bytes());
    }
    let mut hex = hex_encode(&hasher.finalize());
    hex.truncate(ID_LENGTH);
    hex
}

/// Length of feature and region identifiers, in hex characters.
pub const ID_LENGTH: usize = 25;

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

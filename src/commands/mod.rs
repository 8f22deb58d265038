//! CLI command modules.

pub mod blocks;
pub mod delimiters;
pub mod init;
pub mod presets;
pub mod report;
pub mod sync;
pub mod toggle;
pub mod versions;

use anyhow::Result;

use vary::store::FileStore;
use vary::workspace::Workspace;

/// Resolve the enclosing repository's workspace and build the file store.
pub fn context() -> Result<(FileStore, Workspace)> {
    let cwd = std::env::current_dir()?;
    let ws = Workspace::discover(&cwd)?;
    Ok((FileStore::new(), ws))
}

/// Like [`context`], but the workspace must already exist (repaired lazily).
pub fn existing_context() -> Result<(FileStore, Workspace)> {
    let (store, ws) = context()?;
    ws.ensure(&store)?;
    Ok((store, ws))
}

//! Merge orchestration shared by the versions engine.
//!
//! [`merge_to_scratch`] runs the diff3 primitive over three files and writes
//! the output to the workspace's `merge-tmp` scratch file;
//! [`merge_resolving`] additionally drives the conflict resolver until the
//! scratch file is clean. Callers copy the scratch wherever the result
//! belongs and remove it.

pub mod diff3;

use std::path::Path;

use crate::error::Result;
use crate::resolver::{self, ResolverUi};
use crate::store::FileStore;
use crate::workspace::Workspace;

/// Three-way merge `a` and `b` against `base` into `merge-tmp`.
///
/// Returns whether conflict markers were written.
pub fn merge_to_scratch(
    store: &FileStore,
    ws: &Workspace,
    a: &Path,
    base: &Path,
    b: &Path,
    label_a: &str,
    label_b: &str,
) -> Result<bool> {
    let text_a = store.read_string(a)?;
    let text_base = store.read_string(base)?;
    let text_b = store.read_string(b)?;

    let outcome = diff3::merge(&text_a, &text_base, &text_b, label_a, label_b);
    store.write(&ws.merge_tmp(), outcome.merged.as_bytes())?;
    Ok(outcome.has_conflicts)
}

/// [`merge_to_scratch`], then resolve any conflicts interactively.
///
/// On return `merge-tmp` holds the fully resolved result.
#[allow(clippy::too_many_arguments)]
pub fn merge_resolving(
    store: &FileStore,
    ws: &Workspace,
    a: &Path,
    base: &Path,
    b: &Path,
    label_a: &str,
    label_b: &str,
    title: &str,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    let has_conflicts = merge_to_scratch(store, ws, a, base, b, label_a, label_b)?;
    if has_conflicts {
        resolver::resolve_file(store, &ws.merge_tmp(), title, ui)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

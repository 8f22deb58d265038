//! Conflict resolver — the model behind the interactive merge screen.
//!
//! A merge that could not complete cleanly leaves `<<<<<<<`-marked blocks in
//! the scratch file. Each block becomes a [`Conflict`] (1-indexed line range
//! plus raw content); a [`ConflictRecord`] wraps the current value together
//! with owned undo/redo histories of previous values.
//!
//! The resolution loop ([`resolve_file`]) is front-end agnostic: it scans the
//! file, hands the records to a [`ResolverUi`], splices every solved record
//! back (tracking the running line offset), and rescans until no markers
//! remain. Tests drive it with scripted UIs; the binary uses the ratatui
//! front-end in [`tui`].

pub mod tui;

use std::path::Path;

use crate::error::{Result, VaryError};
use crate::merge::diff3::{MARKER_END, MARKER_SEP, MARKER_START};
use crate::store::FileStore;

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// One conflict block inside the host file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    /// First line of the block in the host file (1-indexed, inclusive).
    pub line_start: usize,
    /// Last line of the block (1-indexed, inclusive).
    pub line_end: usize,
    /// Raw block text, markers included while unresolved.
    pub content: String,
}

impl Conflict {
    /// A conflict is resolved once its content carries no marker string.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.content.contains(MARKER_START)
            && !self.content.contains(MARKER_SEP)
            && !self.content.contains(MARKER_END)
    }
}

// ---------------------------------------------------------------------------
// ConflictRecord
// ---------------------------------------------------------------------------

/// A conflict plus its edit history. The histories own their values; undo and
/// redo move whole [`Conflict`] snapshots between the two sequences.
#[derive(Clone, Debug, Default)]
pub struct ConflictRecord {
    /// The value currently shown to the user.
    pub current: Conflict,
    undo: Vec<Conflict>,
    redo: Vec<Conflict>,
}

impl Default for Conflict {
    fn default() -> Self {
        Self {
            line_start: 1,
            line_end: 1,
            content: String::new(),
        }
    }
}

impl ConflictRecord {
    /// Wrap a freshly scanned conflict.
    #[must_use]
    pub fn new(current: Conflict) -> Self {
        Self {
            current,
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// Install `next` as the current value, pushing the previous one onto the
    /// undo history. A no-op when the content is unchanged.
    pub fn record_change(&mut self, next: Conflict) {
        if self.current.content != next.content {
            self.undo.push(std::mem::replace(&mut self.current, next));
        } else {
            self.current = next;
        }
    }

    /// Step back one recorded change.
    pub fn undo(&mut self) {
        if let Some(previous) = self.undo.pop() {
            self.redo.push(std::mem::replace(&mut self.current, previous));
        }
    }

    /// Re-apply the change most recently undone.
    pub fn redo(&mut self) {
        if let Some(next) = self.redo.pop() {
            self.undo.push(std::mem::replace(&mut self.current, next));
        }
    }

    /// Replace the block with the current-side resolution.
    pub fn accept_current(&mut self) -> Result<()> {
        let resolved = sections(&self.current.content)?.join_current();
        self.apply_resolution(resolved);
        Ok(())
    }

    /// Replace the block with the incoming-side resolution.
    pub fn accept_incoming(&mut self) -> Result<()> {
        let resolved = sections(&self.current.content)?.join_incoming();
        self.apply_resolution(resolved);
        Ok(())
    }

    /// Replace the block with both sides, current first.
    pub fn accept_both(&mut self) -> Result<()> {
        let resolved = sections(&self.current.content)?.join_both();
        self.apply_resolution(resolved);
        Ok(())
    }

    fn apply_resolution(&mut self, content: String) {
        let mut next = self.current.clone();
        next.content = content;
        self.record_change(next);
    }

    /// Pull the line above the block into its content.
    ///
    /// # Errors
    ///
    /// Refused when the block already starts at line one or the adjacent
    /// line is itself a conflict marker.
    pub fn extend_up(&mut self, file_lines: &[String]) -> Result<()> {
        if self.current.line_start <= 1 {
            return Err(VaryError::InvalidConflict);
        }
        let line = adjacent_line(file_lines, self.current.line_start - 1)?;
        let mut next = self.current.clone();
        next.line_start -= 1;
        next.content = format!("{line}\n{}", next.content);
        self.record_change(next);
        Ok(())
    }

    /// Pull the line below the block into its content.
    pub fn extend_down(&mut self, file_lines: &[String]) -> Result<()> {
        let line = adjacent_line(file_lines, self.current.line_end + 1)?;
        let mut next = self.current.clone();
        next.line_end += 1;
        next.content = format!("{}\n{line}", next.content);
        self.record_change(next);
        Ok(())
    }
}

/// Fetch the 1-indexed `line` from `file_lines`, refusing conflict markers.
fn adjacent_line(file_lines: &[String], line: usize) -> Result<String> {
    let text = file_lines
        .get(line.wrapping_sub(1))
        .ok_or(VaryError::InvalidConflict)?;
    if text.starts_with(MARKER_START) || text.starts_with(MARKER_END) {
        return Err(VaryError::InvalidConflict);
    }
    Ok(text.clone())
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The four sections of a marker block: text before the markers, the current
/// side, the incoming side, and text after the markers.
#[derive(Debug, Default, PartialEq, Eq)]
struct Sections {
    before: String,
    current: String,
    incoming: String,
    after: String,
}

impl Sections {
    fn join(parts: &[&str]) -> String {
        parts
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn join_current(&self) -> String {
        Self::join(&[&self.before, &self.current, &self.after])
    }

    fn join_incoming(&self) -> String {
        Self::join(&[&self.before, &self.incoming, &self.after])
    }

    fn join_both(&self) -> String {
        Self::join(&[&self.before, &self.current, &self.incoming, &self.after])
    }
}

/// Split a marker block into its sections.
///
/// # Errors
///
/// [`VaryError::InvalidConflict`] when neither side carries content.
fn sections(block: &str) -> Result<Sections> {
    let mut before = Vec::new();
    let mut current = Vec::new();
    let mut incoming = Vec::new();
    let mut after = Vec::new();
    let (mut in_current, mut in_incoming, mut past_markers) = (false, false, false);

    for line in block.split('\n') {
        if line.starts_with(MARKER_START) {
            in_current = true;
        } else if line.starts_with(MARKER_SEP) {
            in_current = false;
            in_incoming = true;
        } else if line.starts_with(MARKER_END) {
            in_incoming = false;
            past_markers = true;
        } else if in_current {
            current.push(line);
        } else if in_incoming {
            incoming.push(line);
        } else if past_markers {
            after.push(line);
        } else {
            before.push(line);
        }
    }

    if current.is_empty() && incoming.is_empty() {
        return Err(VaryError::InvalidConflict);
    }

    Ok(Sections {
        before: before.join("\n"),
        current: current.join("\n"),
        incoming: incoming.join("\n"),
        after: after.join("\n"),
    })
}

// ---------------------------------------------------------------------------
// Scanning and the resolution loop
// ---------------------------------------------------------------------------

/// Scan `text` for conflict blocks, in file order.
#[must_use]
pub fn scan(text: &str) -> Vec<ConflictRecord> {
    let mut records = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut in_conflict = false;
    let mut line_start = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.starts_with(MARKER_START) {
            in_conflict = true;
            line_start = line_no;
            block.clear();
        }
        if in_conflict {
            block.push(line);
        }
        if in_conflict && line.starts_with(MARKER_END) {
            in_conflict = false;
            records.push(ConflictRecord::new(Conflict {
                line_start,
                line_end: line_no,
                content: block.join("\n"),
            }));
        }
    }
    records
}

/// A front-end for one interactive resolution pass. Implementations mutate
/// the records in place and return when the user saves-and-exits; user
/// cancellation surfaces as [`VaryError::Cancelled`].
pub trait ResolverUi {
    /// Run one pass over the records.
    fn run(&mut self, records: &mut [ConflictRecord], path: &Path, title: &str) -> Result<()>;
}

/// Drive `ui` over the conflicts in `path` until the file re-parses clean.
///
/// Each pass splices the solved records back into the file at their line
/// ranges, applying the running offset produced by earlier splices, then
/// rescans. Unsolved records simply come back on the next pass.
pub fn resolve_file(
    store: &FileStore,
    path: &Path,
    title: &str,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    loop {
        let text = store.read_string(path)?;
        let mut records = scan(&text);
        if records.is_empty() {
            return Ok(());
        }

        ui.run(&mut records, path, title)?;

        let mut offset = 0_isize;
        for record in &records {
            if !record.current.is_resolved() {
                continue;
            }
            let new_lines: Vec<String> = if record.current.content.is_empty() {
                Vec::new()
            } else {
                record.current.content.split('\n').map(ToOwned::to_owned).collect()
            };
            #[allow(clippy::cast_possible_wrap)]
            let start = (record.current.line_start as isize + offset) as usize;
            #[allow(clippy::cast_possible_wrap)]
            let end = (record.current.line_end as isize + offset) as usize;
            store.replace_lines(path, start, end, &new_lines)?;

            #[allow(clippy::cast_possible_wrap)]
            let before = (record.current.line_end + 1 - record.current.line_start) as isize;
            #[allow(clippy::cast_possible_wrap)]
            let after = new_lines.len() as isize;
            offset += after - before;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn block(current: &str, incoming: &str) -> String {
        format!("<<<<<<< A\n{current}\n=======\n{incoming}\n>>>>>>> B")
    }

    fn record_with(content: &str) -> ConflictRecord {
        ConflictRecord::new(Conflict {
            line_start: 1,
            line_end: content.lines().count(),
            content: content.to_owned(),
        })
    }

    // -- sections / accepts --

    #[test]
    fn accept_current_keeps_current_side() {
        let mut record = record_with(&block("L1", "L2"));
        record.accept_current().unwrap();
        assert_eq!(record.current.content, "L1");
        assert!(record.current.is_resolved());
    }

    #[test]
    fn accept_incoming_keeps_incoming_side() {
        let mut record = record_with(&block("L1", "L2"));
        record.accept_incoming().unwrap();
        assert_eq!(record.current.content, "L2");
    }

    #[test]
    fn accept_both_concatenates_in_order() {
        let mut record = record_with(&block("L1", "L2"));
        record.accept_both().unwrap();
        assert_eq!(record.current.content, "L1\nL2");
        assert!(record.current.is_resolved());
    }

    #[test]
    fn accept_preserves_context_sections() {
        let content = format!("before\n{}\nafter", block("cur", "inc"));
        let mut record = record_with(&content);
        record.accept_both().unwrap();
        assert_eq!(record.current.content, "before\ncur\ninc\nafter");
    }

    #[test]
    fn empty_both_sides_is_invalid_conflict() {
        let mut record = record_with("<<<<<<< A\n=======\n>>>>>>> B");
        assert!(matches!(
            record.accept_both(),
            Err(VaryError::InvalidConflict)
        ));
    }

    #[test]
    fn one_empty_side_is_still_acceptable() {
        let mut record = record_with("<<<<<<< A\nonly-current\n=======\n>>>>>>> B");
        record.accept_incoming().unwrap();
        assert_eq!(record.current.content, "");
        assert!(record.current.is_resolved());
    }

    // -- undo / redo --

    #[test]
    fn undo_restores_previous_content() {
        let mut record = record_with(&block("L1", "L2"));
        let original = record.current.content.clone();
        record.accept_current().unwrap();
        record.undo();
        assert_eq!(record.current.content, original);
    }

    #[test]
    fn redo_reapplies_undone_change() {
        let mut record = record_with(&block("L1", "L2"));
        record.accept_current().unwrap();
        let resolved = record.current.content.clone();
        record.undo();
        record.redo();
        assert_eq!(record.current.content, resolved);
    }

    #[test]
    fn undo_on_empty_history_is_noop() {
        let mut record = record_with("anything");
        let before = record.current.clone();
        record.undo();
        assert_eq!(record.current, before);
    }

    #[test]
    fn record_change_ignores_identical_content() {
        let mut record = record_with("same");
        record.record_change(record.current.clone());
        record.undo();
        assert_eq!(record.current.content, "same");
    }

    // -- extend context --

    fn file_lines(text: &str) -> Vec<String> {
        text.lines().map(ToOwned::to_owned).collect()
    }

    #[test]
    fn extend_up_prepends_adjacent_line() {
        let file = file_lines("ctx\n<<<<<<< A\nx\n=======\ny\n>>>>>>> B\n");
        let mut record = ConflictRecord::new(Conflict {
            line_start: 2,
            line_end: 6,
            content: file[1..].join("\n"),
        });
        record.extend_up(&file).unwrap();
        assert_eq!(record.current.line_start, 2 - 1);
        assert!(record.current.content.starts_with("ctx\n"));
    }

    #[test]
    fn extend_down_appends_adjacent_line() {
        let file = file_lines("<<<<<<< A\nx\n=======\ny\n>>>>>>> B\ntail\n");
        let mut record = ConflictRecord::new(Conflict {
            line_start: 1,
            line_end: 5,
            content: file[..5].join("\n"),
        });
        record.extend_down(&file).unwrap();
        assert_eq!(record.current.line_end, 6);
        assert!(record.current.content.ends_with("\ntail"));
    }

    #[test]
    fn extend_into_another_conflict_fails() {
        let file = file_lines(">>>>>>> other\n<<<<<<< A\nx\n=======\ny\n>>>>>>> B\n");
        let mut record = ConflictRecord::new(Conflict {
            line_start: 2,
            line_end: 6,
            content: file[1..].join("\n"),
        });
        assert!(record.extend_up(&file).is_err());
    }

    #[test]
    fn extend_past_file_boundary_fails() {
        let file = file_lines("<<<<<<< A\nx\n=======\ny\n>>>>>>> B\n");
        let mut record = ConflictRecord::new(Conflict {
            line_start: 1,
            line_end: 5,
            content: file.join("\n"),
        });
        assert!(record.extend_up(&file).is_err());
        assert!(record.extend_down(&file).is_err());
    }

    // -- scan --

    #[test]
    fn scan_finds_blocks_with_line_ranges() {
        let text = "ok\n<<<<<<< A\nx\n=======\ny\n>>>>>>> B\nok\n<<<<<<< A\np\n=======\nq\n>>>>>>> B\n";
        let records = scan(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].current.line_start, 2);
        assert_eq!(records[0].current.line_end, 6);
        assert_eq!(records[1].current.line_start, 8);
        assert_eq!(records[1].current.line_end, 12);
    }

    #[test]
    fn scan_clean_text_finds_nothing() {
        assert!(scan("a\nb\nc\n").is_empty());
    }

    // -- resolve_file --

    /// Scripted UI: applies one accept per record per pass.
    struct AcceptAll;

    impl ResolverUi for AcceptAll {
        fn run(&mut self, records: &mut [ConflictRecord], _path: &Path, _title: &str) -> Result<()> {
            for record in records {
                record.accept_both()?;
            }
            Ok(())
        }
    }

    /// Scripted UI: resolves only the first record each pass.
    struct AcceptFirstOnly;

    impl ResolverUi for AcceptFirstOnly {
        fn run(&mut self, records: &mut [ConflictRecord], _path: &Path, _title: &str) -> Result<()> {
            if let Some(record) = records.first_mut() {
                record.accept_current()?;
            }
            Ok(())
        }
    }

    #[test]
    fn resolve_file_splices_all_blocks() {
        let store = FileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge-tmp");
        store
            .write(
                &path,
                b"head\n<<<<<<< A\nx\n=======\ny\n>>>>>>> B\nmid\n<<<<<<< A\np\n=======\nq\n>>>>>>> B\ntail\n",
            )
            .unwrap();

        resolve_file(&store, &path, "merge", &mut AcceptAll).unwrap();
        assert_eq!(
            store.read_string(&path).unwrap(),
            "head\nx\ny\nmid\np\nq\ntail\n"
        );
    }

    #[test]
    fn resolve_file_loops_until_clean() {
        let store = FileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge-tmp");
        store
            .write(
                &path,
                b"<<<<<<< A\nx\n=======\ny\n>>>>>>> B\n<<<<<<< A\np\n=======\nq\n>>>>>>> B\n",
            )
            .unwrap();

        // One record per pass: the loop must run twice before the file is clean.
        resolve_file(&store, &path, "merge", &mut AcceptFirstOnly).unwrap();
        assert_eq!(store.read_string(&path).unwrap(), "x\np\n");
    }

    #[test]
    fn resolve_file_clean_input_returns_immediately() {
        let store = FileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge-tmp");
        store.write(&path, b"no conflicts here\n").unwrap();
        resolve_file(&store, &path, "merge", &mut AcceptAll).unwrap();
        assert_eq!(store.read_string(&path).unwrap(), "no conflicts here\n");
    }

    #[test]
    fn resolve_file_propagates_cancellation() {
        struct Cancel;
        impl ResolverUi for Cancel {
            fn run(&mut self, _r: &mut [ConflictRecord], _p: &Path, _t: &str) -> Result<()> {
                Err(VaryError::Cancelled)
            }
        }
        let store = FileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge-tmp");
        store
            .write(&path, b"<<<<<<< A\nx\n=======\ny\n>>>>>>> B\n")
            .unwrap();
        let err = resolve_file(&store, &path, "merge", &mut Cancel).unwrap_err();
        assert!(err.is_cancelled());
    }
}

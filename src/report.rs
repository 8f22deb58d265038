//! Status tables for both engines.
//!
//! Plain fixed-width text tables, one section per tracked file. Version rows
//! are annotated FEATURE (solo key) or STATE (composite key) and ON / OFF /
//! ACTIVE / NOT ACTIVE; rows are sorted by descending name length for
//! legibility.

use std::collections::BTreeMap;

use crate::blocks;
use crate::error::Result;
use crate::state::State;
use crate::store::FileStore;
use crate::versions;
use crate::workspace::Workspace;

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Render a fixed-width table with a header row.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let render_row = |cells: &[String]| -> String {
        let mut line = String::new();
        for (idx, cell) in cells.iter().enumerate() {
            let width = widths.get(idx).copied().unwrap_or(cell.len());
            line.push_str(&format!("{cell:width$}  "));
        }
        line.trim_end().to_owned()
    };

    let header_cells: Vec<String> = headers.iter().map(|h| (*h).to_owned()).collect();
    out.push_str(&render_row(&header_cells));
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

fn sort_by_name_length(rows: &mut [Vec<String>]) {
    rows.sort_by(|a, b| b[0].len().cmp(&a[0].len()));
}

// ---------------------------------------------------------------------------
// Blocks report
// ---------------------------------------------------------------------------

/// Per-file tables of block features and their states.
pub fn all_blocks_details(store: &FileStore, ws: &Workspace) -> Result<String> {
    let mut out = String::from("Blocks report\n");
    for (path, records) in blocks::list_all_blocks(store, ws)? {
        // One row per feature name; regions of the same feature share state.
        let mut by_name: BTreeMap<String, State> = BTreeMap::new();
        for record in records {
            by_name.entry(record.name).or_insert(record.state);
        }
        let mut rows: Vec<Vec<String>> = by_name
            .into_iter()
            .map(|(name, state)| vec![name, state.to_string()])
            .collect();
        sort_by_name_length(&mut rows);

        out.push_str(&format!("\n{path}\n"));
        out.push_str(&render_table(&["NAME", "STATE"], &rows));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Versions report
// ---------------------------------------------------------------------------

/// Per-file tables of version features and states.
pub fn all_version_details(store: &FileStore, ws: &Workspace) -> Result<String> {
    let mut out = String::from("Versions report\n");
    for path in ws.tracked_paths(store, &ws.versions_dir())? {
        let entries = versions::state_entries(store, ws, &path)?;
        let on = versions::current_on_ids(store, ws, &path)?;
        let mut rows: Vec<Vec<String>> = entries
            .iter()
            .map(|entry| {
                let kind = if entry.is_solo() { "FEATURE" } else { "STATE" };
                let state = if entry.is_solo() {
                    if on.contains(&entry.ids[0]) { "ON" } else { "OFF" }
                } else if entry.is_current {
                    "ACTIVE"
                } else {
                    "NOT ACTIVE"
                };
                vec![entry.label(), kind.to_owned(), state.to_owned()]
            })
            .collect();
        sort_by_name_length(&mut rows);

        out.push_str(&format!("\n{path}\n"));
        out.push_str(&render_table(&["NAME", "TYPE", "STATE"], &rows));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ConflictRecord, ResolverUi};
    use std::path::Path;

    struct NoUi;
    impl ResolverUi for NoUi {
        fn run(&mut self, _r: &mut [ConflictRecord], _p: &Path, _t: &str) -> Result<()> {
            Ok(())
        }
    }

    fn fixture() -> (FileStore, tempfile::TempDir, Workspace) {
        let store = FileStore::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::at(dir.path().to_path_buf());
        ws.init(&store).unwrap();
        (store, dir, ws)
    }

    #[test]
    fn render_table_pads_columns() {
        let out = render_table(
            &["NAME", "STATE"],
            &[
                vec!["dark-mode".into(), "ON".into()],
                vec!["x".into(), "OFF".into()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "NAME       STATE");
        assert_eq!(lines[1], "dark-mode  ON");
        assert_eq!(lines[2], "x          OFF");
    }

    #[test]
    fn blocks_report_lists_features() {
        let (store, _dir, ws) = fixture();
        let content =
            "// @feature(alpha-mode) //\nA\n// @default(alpha-mode) //\nB\n// !feature //\n";
        store.write(&ws.abs("a.go"), content.as_bytes()).unwrap();
        blocks::handle_block(&store, &ws, "a.go").unwrap();

        let report = all_blocks_details(&store, &ws).unwrap();
        assert!(report.contains("a.go"));
        assert!(report.contains("alpha-mode"));
        assert!(report.contains("DEV"));
    }

    #[test]
    fn versions_report_annotates_rows() {
        let (store, _dir, ws) = fixture();
        store.write(&ws.abs("conf.txt"), b"x\n").unwrap();
        versions::base(&store, &ws, "conf.txt").unwrap();
        store.write(&ws.abs("conf.txt"), b"y\n").unwrap();
        versions::new_feature(&store, &ws, "conf.txt", "dark-mode", &mut NoUi).unwrap();

        let report = all_version_details(&store, &ws).unwrap();
        assert!(report.contains("conf.txt"));
        assert!(report.contains("dark-mode"));
        assert!(report.contains("FEATURE"));
        assert!(report.contains("ON"));
    }

    #[test]
    fn reports_sort_rows_by_descending_name_length() {
        let mut rows = vec![
            vec!["ab".to_owned(), "x".to_owned()],
            vec!["abcdef".to_owned(), "x".to_owned()],
            vec!["abcd".to_owned(), "x".to_owned()],
        ];
        sort_by_name_length(&mut rows);
        assert_eq!(rows[0][0], "abcdef");
        assert_eq!(rows[2][0], "ab");
    }
}

//! Line-level three-way merge.
//!
//! Classic diff3: two two-way line diffs against the common base are aligned
//! into stable and unstable chunks. Stable chunks (all three agree) pass
//! through; a chunk changed on only one side takes that side; divergent
//! changes emit an annotated conflict block:
//!
//! ```text
//! <<<<<<< labelA
//! <A lines>
//! =======
//! <B lines>
//! >>>>>>> labelB
//! ```
//!
//! The two-way diffs come from the `similar` crate. A difference only in the
//! trailing newline never conflicts.

use similar::{DiffOp, TextDiff};

/// Opening marker of a conflict block (label appended).
pub const MARKER_START: &str = "<<<<<<<";
/// Separator between the two sides of a conflict block.
pub const MARKER_SEP: &str = "=======";
/// Closing marker of a conflict block (label appended).
pub const MARKER_END: &str = ">>>>>>>";

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// Result of a three-way merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged text, conflict markers included when unresolved.
    pub merged: String,
    /// Whether any conflict block was emitted.
    pub has_conflicts: bool,
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Merge `a` and `b` against their common `base`.
///
/// Where both sides agree the common text is emitted; where only one side
/// changed relative to the base, that side wins; where both changed
/// differently, a conflict block labelled with `label_a` / `label_b` is
/// emitted.
#[must_use]
pub fn merge(a: &str, base: &str, b: &str, label_a: &str, label_b: &str) -> MergeOutcome {
    let a_lines = split_lines(a);
    let base_lines = split_lines(base);
    let b_lines = split_lines(b);

    let match_a = base_matches(&base_lines, &a_lines);
    let match_b = base_matches(&base_lines, &b_lines);

    let mut out: Vec<&str> = Vec::new();
    let mut has_conflicts = false;
    let label_a_line = format!("{MARKER_START} {label_a}");
    let label_b_line = format!("{MARKER_END} {label_b}");

    // Cursors into a, base and b.
    let (mut la, mut lo, mut lb) = (0_usize, 0_usize, 0_usize);

    loop {
        // Stable run: base line lo+i matches a at la+i and b at lb+i.
        let mut i = 0;
        while lo + i < base_lines.len()
            && match_a[lo + i] == Some(la + i)
            && match_b[lo + i] == Some(lb + i)
        {
            i += 1;
        }
        out.extend_from_slice(&base_lines[lo..lo + i]);
        la += i;
        lo += i;
        lb += i;

        if lo == base_lines.len() && la == a_lines.len() && lb == b_lines.len() {
            break;
        }

        // Unstable chunk: scan for the next base line matched on both sides
        // at or beyond the current cursors.
        let mut next = None;
        let mut o = lo;
        while o < base_lines.len() {
            if let (Some(ma), Some(mb)) = (match_a[o], match_b[o])
                && ma >= la
                && mb >= lb
            {
                next = Some((o, ma, mb));
                break;
            }
            o += 1;
        }
        let (base_end, a_end, b_end) =
            next.unwrap_or((base_lines.len(), a_lines.len(), b_lines.len()));

        let chunk_a = &a_lines[la..a_end];
        let chunk_base = &base_lines[lo..base_end];
        let chunk_b = &b_lines[lb..b_end];

        if chunk_a == chunk_base {
            out.extend_from_slice(chunk_b);
        } else if chunk_b == chunk_base || chunk_a == chunk_b {
            out.extend_from_slice(chunk_a);
        } else {
            has_conflicts = true;
            out.push(&label_a_line);
            out.extend_from_slice(chunk_a);
            out.push(MARKER_SEP);
            out.extend_from_slice(chunk_b);
            out.push(&label_b_line);
        }

        la = a_end;
        lo = base_end;
        lb = b_end;
    }

    let emitted_lines = !out.is_empty();
    let mut merged = out.join("\n");
    if emitted_lines && (a.ends_with('\n') || b.ends_with('\n')) {
        merged.push('\n');
    }

    MergeOutcome {
        merged,
        has_conflicts,
    }
}

/// Split into lines without a phantom trailing element for a final newline.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed.split('\n').collect()
}

/// For each base line, the index of the side line it is matched to, built
/// from the equal runs of a two-way diff.
fn base_matches(base: &[&str], side: &[&str]) -> Vec<Option<usize>> {
    let mut matches = vec![None; base.len()];
    let diff = TextDiff::from_slices(base, side);
    for op in diff.ops() {
        if let DiffOp::Equal {
            old_index,
            new_index,
            len,
        } = *op
        {
            for k in 0..len {
                matches[old_index + k] = Some(new_index + k);
            }
        }
    }
    matches
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_pass_through() {
        let text = "a\nb\nc\n";
        let out = merge(text, text, text, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, text);
    }

    #[test]
    fn one_side_changed_wins() {
        let base = "a\nb\nc\n";
        let a = "a\nB\nc\n";
        let out = merge(a, base, base, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, a);

        let out = merge(base, base, a, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, a);
    }

    #[test]
    fn non_overlapping_changes_combine() {
        let base = "one\ntwo\nthree\nfour\nfive\n";
        let a = "ONE\ntwo\nthree\nfour\nfive\n";
        let b = "one\ntwo\nthree\nfour\nFIVE\n";
        let out = merge(a, base, b, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "ONE\ntwo\nthree\nfour\nFIVE\n");
    }

    #[test]
    fn both_sides_same_change_is_clean() {
        let base = "x\ny\n";
        let changed = "x\nz\n";
        let out = merge(changed, base, changed, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, changed);
    }

    #[test]
    fn divergent_changes_conflict_with_labels() {
        let base = "keep\nmiddle\nkeep2\n";
        let a = "keep\nfrom-a\nkeep2\n";
        let b = "keep\nfrom-b\nkeep2\n";
        let out = merge(a, base, b, "dark-mode", "new base");
        assert!(out.has_conflicts);
        let expected = "keep\n<<<<<<< dark-mode\nfrom-a\n=======\nfrom-b\n>>>>>>> new base\nkeep2\n";
        assert_eq!(out.merged, expected);
    }

    #[test]
    fn insertion_on_one_side() {
        let base = "a\nb\n";
        let a = "a\nnew\nb\n";
        let out = merge(a, base, base, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "a\nnew\nb\n");
    }

    #[test]
    fn deletion_on_one_side() {
        let base = "a\nb\nc\n";
        let b = "a\nc\n";
        let out = merge(base, base, b, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "a\nc\n");
    }

    #[test]
    fn delete_vs_edit_conflicts() {
        let base = "a\nmid\nz\n";
        let a = "a\nz\n";
        let b = "a\nMID\nz\n";
        let out = merge(a, base, b, "A", "B");
        assert!(out.has_conflicts);
        assert!(out.merged.contains("<<<<<<< A"));
        assert!(out.merged.contains("MID"));
    }

    #[test]
    fn trailing_newline_only_difference_is_not_a_conflict() {
        let base = "a\nb";
        let a = "a\nb\n";
        let out = merge(a, base, base, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "a\nb\n");
    }

    #[test]
    fn empty_base_both_sides_add_same() {
        let out = merge("x\n", "", "x\n", "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "x\n");
    }

    #[test]
    fn empty_base_divergent_additions_conflict() {
        let out = merge("x\n", "", "y\n", "A", "B");
        assert!(out.has_conflicts);
        assert_eq!(out.merged, "<<<<<<< A\nx\n=======\ny\n>>>>>>> B\n");
    }

    #[test]
    fn all_empty_is_empty() {
        let out = merge("", "", "", "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "");
    }

    #[test]
    fn changes_at_both_ends_merge_cleanly() {
        let base = "start\nmid1\nmid2\nend\n";
        let a = "START\nmid1\nmid2\nend\n";
        let b = "start\nmid1\nmid2\nEND\n";
        let out = merge(a, base, b, "A", "B");
        assert!(!out.has_conflicts);
        assert_eq!(out.merged, "START\nmid1\nmid2\nEND\n");
    }

    proptest::proptest! {
        // Merging a side with the unchanged base always yields that side.
        #[test]
        fn one_sided_merge_is_identity(
            base_lines in proptest::collection::vec("[a-z]{0,6}", 0..12),
            side_lines in proptest::collection::vec("[a-z]{0,6}", 0..12),
        ) {
            let base = if base_lines.is_empty() { String::new() } else { base_lines.join("\n") + "\n" };
            let side = if side_lines.is_empty() { String::new() } else { side_lines.join("\n") + "\n" };
            let out = merge(&side, &base, &base, "A", "B");
            proptest::prop_assert!(!out.has_conflicts);
            proptest::prop_assert_eq!(out.merged, side);
        }
    }
}

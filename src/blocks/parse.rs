//! Parser and rewriter for in-file `@feature`/`@default` regions.
//!
//! A region is delimited by the comment markers of its host language:
//!
//! ```text
//! // @feature(dark-mode) 1a2b… //
//! let theme = Dark;
//! // @default(dark-mode) 1a2b… //
//! let theme = Light;
//! // !feature //
//! ```
//!
//! A region carries a feature branch, a default branch, or both; the three
//! shapes are a sum type so the rewriter is exhaustive. Parsing then
//! re-emitting a canonical region is a no-op on its bytes.
//!
//! Region IDs are deterministic: `sha256(path ∥ name ∥ first-line)[..25]`,
//! where `first-line` is the 1-indexed file line on which the region begins.
//! IDs must be recomputable from file contents alone.

use regex::Regex;

use crate::delimiters::Delimiter;
use crate::store::generate_id;

/// Minimum length of a feature name inside a region marker.
pub const MIN_FEATURE_LEN: usize = 5;

// ---------------------------------------------------------------------------
// RegionKind
// ---------------------------------------------------------------------------

/// Which branches a region currently materialises in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Only the feature branch is present (`state = ON` on disk).
    Feature {
        /// The feature branch body, delimiter-to-delimiter.
        feature: String,
    },
    /// Only the default branch is present (`state = OFF` on disk).
    Default {
        /// The default branch body.
        default: String,
    },
    /// Both branches are present (`state = DEV`).
    Both {
        /// The feature branch body.
        feature: String,
        /// The default branch body.
        default: String,
    },
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// One parsed region of a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// 25-hex identifier, parsed from the file or synthesised.
    pub id: String,
    /// Whether the ID token was present in the file.
    pub id_found: bool,
    /// The feature name.
    pub name: String,
    /// Which branches the region materialises.
    pub kind: RegionKind,
    /// The exact matched text, used for literal substitution.
    pub text: String,
    /// The delimiter pair the region was parsed with.
    pub delimiter: Delimiter,
}

impl Region {
    /// The feature branch body, empty when not materialised.
    #[must_use]
    pub fn feature_content(&self) -> &str {
        match &self.kind {
            RegionKind::Feature { feature } | RegionKind::Both { feature, .. } => feature,
            RegionKind::Default { .. } => "",
        }
    }

    /// The default branch body, empty when not materialised.
    #[must_use]
    pub fn default_content(&self) -> &str {
        match &self.kind {
            RegionKind::Default { default } | RegionKind::Both { default, .. } => default,
            RegionKind::Feature { .. } => "",
        }
    }

    /// A copy of this region with a different kind (used by the state
    /// machine to rewrite between the three shapes).
    #[must_use]
    pub fn with_kind(&self, kind: RegionKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Canonical textual form, with or without the ID token.
    #[must_use]
    pub fn render(&self, with_id: bool) -> String {
        let s = &self.delimiter.start;
        let e = &self.delimiter.end;
        let name = &self.name;
        let id_token = if with_id {
            format!(" {}", self.id)
        } else {
            String::new()
        };
        match &self.kind {
            RegionKind::Feature { feature } => {
                format!("{s}@feature({name}){id_token}{e}{feature}{s}!feature{e}")
            }
            RegionKind::Default { default } => {
                format!("{s}@default({name}){id_token}{e}{default}{s}!feature{e}")
            }
            RegionKind::Both { feature, default } => {
                format!(
                    "{s}@feature({name}){id_token}{e}{feature}{s}@default({name}){id_token}{e}{default}{s}!feature{e}"
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract every region of `text`, in file order. `path` seeds synthesised
/// IDs. Malformed regions (a bare `@default` with no matching `@feature`,
/// or content that cannot be located for ID synthesis) are skipped.
#[must_use]
pub fn extract(path: &str, text: &str, delimiter: &Delimiter) -> Vec<Region> {
    let s = regex::escape(&delimiter.start);
    let e = regex::escape(&delimiter.end);

    let Ok(outer) = Regex::new(&format!(
        r"{s}@(feature|default)\(([^)]{{{MIN_FEATURE_LEN},}})\)\s*(\S+)?\s*{e}[\s\S]*?{s}!feature{e}"
    )) else {
        return Vec::new();
    };

    let mut regions = Vec::new();
    for m in outer.find_iter(text) {
        let match_text = m.as_str();
        let Some(caps) = outer.captures(match_text) else {
            continue;
        };
        let name = caps[2].to_owned();
        let id_token = caps.get(3).map(|g| g.as_str().to_owned());

        let Some(kind) = classify(match_text, &name, &s, &e) else {
            continue;
        };

        let (id, id_found) = match id_token {
            Some(id) => (id, true),
            None => {
                let line = line_of_offset(text, m.start());
                (generate_id(&[path, &name, &line.to_string()]), false)
            }
        };

        regions.push(Region {
            id,
            id_found,
            name,
            kind,
            text: match_text.to_owned(),
            delimiter: delimiter.clone(),
        });
    }
    regions
}

/// Classify a matched region into its kind. `s` and `e` are the
/// regex-escaped delimiters.
fn classify(match_text: &str, name: &str, s: &str, e: &str) -> Option<RegionKind> {
    let named_default = format!("@default({name})");
    let has_named_default = match_text.contains(&named_default);
    if match_text.contains("@default") && !has_named_default {
        // A stray @default for some other name inside this region.
        return None;
    }

    let n = regex::escape(name);
    if has_named_default {
        // Feature-then-default, the canonical order.
        if let Ok(re) = Regex::new(&format!(
            r"{s}@feature\({n}\)\s*(\S+)?\s*{e}([\s\S]*?){s}@default\({n}\)\s*(\S+)?\s*{e}([\s\S]*?){s}!feature{e}"
        )) && let Some(caps) = re.captures(match_text)
        {
            return Some(RegionKind::Both {
                feature: caps[2].to_owned(),
                default: caps[4].to_owned(),
            });
        }
        // Default-then-feature is accepted on input and normalised on output.
        if let Ok(re) = Regex::new(&format!(
            r"{s}@default\({n}\)\s*(\S+)?\s*{e}([\s\S]*?){s}@feature\({n}\)\s*(\S+)?\s*{e}([\s\S]*?){s}!feature{e}"
        )) && let Some(caps) = re.captures(match_text)
        {
            return Some(RegionKind::Both {
                feature: caps[4].to_owned(),
                default: caps[2].to_owned(),
            });
        }
        // Default branch alone.
        if let Ok(re) = Regex::new(&format!(
            r"{s}@default\({n}\)\s*(\S+)?\s*{e}([\s\S]*?){s}!feature{e}"
        )) && let Some(caps) = re.captures(match_text)
        {
            return Some(RegionKind::Default {
                default: caps[2].to_owned(),
            });
        }
        return None;
    }

    if let Ok(re) = Regex::new(&format!(
        r"{s}@feature\({n}\)\s*(\S+)?\s*{e}([\s\S]*?){s}!feature{e}"
    )) && let Some(caps) = re.captures(match_text)
    {
        return Some(RegionKind::Feature {
            feature: caps[2].to_owned(),
        });
    }
    None
}

/// 1-indexed line on which the byte at `offset` sits. Seeds ID synthesis so
/// two otherwise identical regions at different lines get distinct IDs.
fn line_of_offset(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Replace the first occurrence of `old` in `text`. A missing `old` leaves
/// the text unchanged.
#[must_use]
pub fn replace_region(text: &str, old: &str, new: &str) -> String {
    text.replacen(old, new, 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn delim() -> Delimiter {
        Delimiter::padded("//", "//")
    }

    const FILE: &str = "// @feature(alpha-mode) //\nlet x = 1;\n// @default(alpha-mode) //\nlet x = 0;\n// !feature //\n";

    #[test]
    fn extract_both_region() {
        let regions = extract("src/a.go", FILE, &delim());
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.name, "alpha-mode");
        assert!(!region.id_found);
        assert_eq!(region.id.len(), 25);
        assert_eq!(
            region.kind,
            RegionKind::Both {
                feature: "\nlet x = 1;\n".to_owned(),
                default: "\nlet x = 0;\n".to_owned(),
            }
        );
    }

    #[test]
    fn extract_single_line_region() {
        let text = "// @feature(alpha-mode) // A // @default(alpha-mode) // B // !feature //";
        let regions = extract("foo.go", text, &delim());
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].kind,
            RegionKind::Both {
                feature: " A ".to_owned(),
                default: " B ".to_owned(),
            }
        );
    }

    #[test]
    fn extract_feature_only_region() {
        let text = "// @feature(dark-mode) //\non();\n// !feature //\n";
        let regions = extract("a.go", text, &delim());
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].kind,
            RegionKind::Feature {
                feature: "\non();\n".to_owned()
            }
        );
    }

    #[test]
    fn extract_default_only_region() {
        let text = "// @default(dark-mode) //\noff();\n// !feature //\n";
        let regions = extract("a.go", text, &delim());
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].kind,
            RegionKind::Default {
                default: "\noff();\n".to_owned()
            }
        );
    }

    #[test]
    fn extract_accepts_default_then_feature_order() {
        let text =
            "// @default(theme-kind) //\nB\n// @feature(theme-kind) //\nA\n// !feature //\n";
        let regions = extract("a.go", text, &delim());
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].kind,
            RegionKind::Both {
                feature: "\nA\n".to_owned(),
                default: "\nB\n".to_owned(),
            }
        );
    }

    #[test]
    fn mismatched_default_name_is_rejected() {
        let text = "// @feature(alpha-mode) //\nA\n// @default(other-name) //\nB\n// !feature //\n";
        assert!(extract("a.go", text, &delim()).is_empty());
    }

    #[test]
    fn short_names_do_not_match() {
        let text = "// @feature(abc) //\nA\n// !feature //\n";
        assert!(extract("a.go", text, &delim()).is_empty());
    }

    #[test]
    fn extract_reads_existing_id_token() {
        let id = "a".repeat(25);
        let text = format!("// @feature(dark-mode) {id} //\nx\n// !feature //\n");
        let regions = extract("a.go", &text, &delim());
        assert_eq!(regions.len(), 1);
        assert!(regions[0].id_found);
        assert_eq!(regions[0].id, id);
    }

    #[test]
    fn ids_are_deterministic_per_location() {
        let one = extract("a.go", FILE, &delim());
        let two = extract("a.go", FILE, &delim());
        assert_eq!(one[0].id, two[0].id);
        // A different path yields a different id.
        let other = extract("b.go", FILE, &delim());
        assert_ne!(one[0].id, other[0].id);
    }

    #[test]
    fn same_name_different_lines_get_different_ids() {
        let text = format!("{FILE}\nfiller();\n{FILE}");
        let regions = extract("a.go", &text, &delim());
        assert_eq!(regions.len(), 2);
        assert_ne!(regions[0].id, regions[1].id);
    }

    #[test]
    fn multiple_regions_in_file_order() {
        let text = "// @feature(first-one) //\nA\n// !feature //\n// @feature(second-one) //\nB\n// !feature //\n";
        let regions = extract("a.go", text, &delim());
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].name, "first-one");
        assert_eq!(regions[1].name, "second-one");
    }

    #[test]
    fn render_roundtrips_canonical_text() {
        let id = "b".repeat(25);
        let text = format!(
            "// @feature(dark-mode) {id} //\nA\n// @default(dark-mode) {id} //\nB\n// !feature //"
        );
        let regions = extract("a.go", &text, &delim());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].render(true), text);
        assert_eq!(regions[0].text, text);
    }

    #[test]
    fn render_without_id() {
        let regions = extract("a.go", FILE, &delim());
        let rendered = regions[0].render(false);
        assert_eq!(
            rendered,
            "// @feature(alpha-mode) //\nlet x = 1;\n// @default(alpha-mode) //\nlet x = 0;\n// !feature //"
        );
    }

    #[test]
    fn render_feature_only_with_id() {
        let regions = extract("a.go", FILE, &delim());
        let feature_only = regions[0].with_kind(RegionKind::Feature {
            feature: regions[0].feature_content().to_owned(),
        });
        let rendered = feature_only.render(true);
        assert_eq!(
            rendered,
            format!(
                "// @feature(alpha-mode) {} //\nlet x = 1;\n// !feature //",
                regions[0].id
            )
        );
    }

    #[test]
    fn html_delimiters() {
        let delim = Delimiter::padded("<!--", "-->");
        let text = "<!-- @feature(hero-banner) -->\n<div/>\n<!-- !feature -->\n";
        let regions = extract("index.html", text, &delim);
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].kind,
            RegionKind::Feature {
                feature: "\n<div/>\n".to_owned()
            }
        );
    }

    #[test]
    fn replace_region_first_occurrence_only() {
        let text = "aXbXc";
        assert_eq!(replace_region(text, "X", "Y"), "aYbXc");
    }

    #[test]
    fn replace_region_missing_old_is_noop() {
        assert_eq!(replace_region("abc", "zzz", "Y"), "abc");
    }

    #[test]
    fn branch_accessors() {
        let regions = extract("a.go", FILE, &delim());
        assert_eq!(regions[0].feature_content(), "\nlet x = 1;\n");
        assert_eq!(regions[0].default_content(), "\nlet x = 0;\n");
    }
}

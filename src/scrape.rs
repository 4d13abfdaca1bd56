use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::hierarchy::FragmentRow;
use crate::Error;

// Tagger tree pages mark each entry with `tags-list__row depth-N`; the tag
// name is the text of the row's first anchor.
static ROW_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="([^"]*tags-list__row[^"]*)""#).unwrap());
static DEPTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"depth-(\d+)").unwrap());
static ANCHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<a[^>]*>(.*?)</a>").unwrap());
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Pulls `(anchor, depth)` rows out of one saved Tagger page, in document
/// order. Rows without a depth marker are dropped; a row whose anchor text
/// cannot be extracted keeps its place with an empty anchor so the fragment
/// parser can skip it.
pub fn extract_rows(html: &str) -> Vec<FragmentRow> {
    let rows: Vec<regex::Captures> = ROW_CLASS.captures_iter(html).collect();
    let mut out = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let Some(depth) = DEPTH
            .captures(&row[1])
            .and_then(|d| d[1].parse::<usize>().ok())
        else {
            continue;
        };
        let start = row.get(0).map_or(0, |m| m.end());
        let end = rows
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let anchor = ANCHOR
            .captures(&html[start..end])
            // the anchor body may carry nested markup; only its text counts
            .map(|a| collapse_whitespace(&MARKUP.replace_all(&a[1], " ")))
            .filter(|text| !text.is_empty());
        out.push(FragmentRow { anchor, depth });
    }

    out
}

// prettified pages break anchor text across indented lines
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Loads every saved `.html` page of `dir` as one fragment each, in path
/// order so repeated runs see the fragments in the same order.
pub fn fragments_from_dir(dir: &Path) -> Result<Vec<Vec<FragmentRow>>, Error> {
    let mut pages: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("html")
        })
        .collect();
    pages.sort();

    pages
        .iter()
        .map(|path| Ok(extract_rows(&fs::read_to_string(path)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="site-body">
          <div class="tags-list__row depth-1">
            <a href="/tags/card/removal">
              Removal
            </a>
          </div>
          <div class="tags-list__row depth-2">
            <a href="/tags/card/exile">Exile</a>
          </div>
          <div class="tags-list__row depth-2">
            <span>no anchor here</span>
          </div>
          <div class="tags-list__row">
            <a href="/tags/card/stray">Stray</a>
          </div>
        </div>
    "#;

    #[test]
    fn rows_come_out_in_document_order() {
        let rows = extract_rows(PAGE);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].anchor.as_deref(), Some("Removal"));
        assert_eq!(rows[0].depth, 1);
        assert_eq!(rows[1].anchor.as_deref(), Some("Exile"));
        assert_eq!(rows[1].depth, 2);
    }

    #[test]
    fn row_without_anchor_keeps_its_slot() {
        let rows = extract_rows(PAGE);
        assert_eq!(rows[2].anchor, None);
        assert_eq!(rows[2].depth, 2);
    }

    #[test]
    fn anchor_with_nested_markup_keeps_its_text() {
        let page = r#"
            <div class="tags-list__row depth-1">
              <a href="/tags/card/board-wipe"><span class="icon"></span>Board
                Wipe</a>
            </div>
        "#;
        let rows = extract_rows(page);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].anchor.as_deref(), Some("Board Wipe"));
    }

    #[test]
    fn row_without_depth_marker_is_dropped() {
        let rows = extract_rows(PAGE);
        assert!(rows.iter().all(|r| r.anchor.as_deref() != Some("Stray")));
    }
}

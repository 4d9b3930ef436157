//! Case-insensitive phrase matching over positioned glyphs.
//!
//! Both backends reduce a page's text layer to a flat run of [`Glyph`]s in
//! reading order and hand it to [`find_matches`], so the matching rules are
//! identical no matter which engine produced the glyphs.

use crate::PageRect;

/// A single character of the page text layer.
///
/// `bounds` is `None` for synthetic separators inserted between text runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bounds: Option<PageRect>,
}

impl Glyph {
    pub fn new(ch: char, bounds: PageRect) -> Self {
        Self { ch, bounds: Some(bounds) }
    }

    pub fn separator() -> Self {
        Self { ch: ' ', bounds: None }
    }
}

fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Find every non-overlapping occurrence of `query` in `glyphs`.
///
/// Returns one region per occurrence: the union of the matched glyph boxes.
/// An empty query matches nothing.
pub fn find_matches(glyphs: &[Glyph], query: &str) -> Vec<PageRect> {
    let needle: Vec<char> = query.chars().map(fold).collect();
    if needle.is_empty() || needle.len() > glyphs.len() {
        return Vec::new();
    }

    let haystack: Vec<char> = glyphs.iter().map(|glyph| fold(glyph.ch)).collect();
    let mut regions = Vec::new();
    let mut start = 0;

    while start + needle.len() <= haystack.len() {
        if haystack[start..start + needle.len()] == needle[..] {
            let region = glyphs[start..start + needle.len()]
                .iter()
                .filter_map(|glyph| glyph.bounds)
                .reduce(|acc, rect| acc.union(&rect));

            if let Some(region) = region {
                regions.push(region);
            }
            start += needle.len();
        } else {
            start += 1;
        }
    }

    regions
}

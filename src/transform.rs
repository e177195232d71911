//! HTML transforms applied per grid level.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GawError, GawResult};
use crate::grid::{GridClassification, GridLevel};

pub const REMOVE_START: &str = "<!-- gaw:remove -->";
pub const REMOVE_END: &str = "<!-- /gaw:remove -->";

/// Rewrites a full HTML document. The pipeline knows nothing else about it.
pub trait HtmlTransform {
    fn transform(&self, html: &str) -> GawResult<String>;
}

impl<F> HtmlTransform for F
where
    F: Fn(&str) -> GawResult<String>,
{
    fn transform(&self, html: &str) -> GawResult<String> {
        self(html)
    }
}

/// Declarative page changes that can live in the Worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetTransform {
    /// Markup inserted right before `</head>`
    #[serde(default)]
    pub head: Option<String>,

    /// Markup inserted right before the last `</body>`, or appended
    #[serde(default)]
    pub body_end: Option<String>,

    /// Drop everything between `<!-- gaw:remove -->` and `<!-- /gaw:remove -->`
    #[serde(default)]
    pub strip_marked: bool,
}

impl HtmlTransform for SnippetTransform {
    fn transform(&self, html: &str) -> GawResult<String> {
        let mut out = if self.strip_marked {
            strip_marked_sections(html)?
        } else {
            html.to_string()
        };

        if let Some(head) = &self.head {
            if let Some(at) = find_ascii_case_insensitive(&out, "</head>", false) {
                out.insert_str(at, head);
            }
        }

        if let Some(body_end) = &self.body_end {
            match find_ascii_case_insensitive(&out, "</body>", true) {
                Some(at) => out.insert_str(at, body_end),
                None => out.push_str(body_end),
            }
        }

        Ok(out)
    }
}

fn strip_marked_sections(html: &str) -> GawResult<String> {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(REMOVE_START) {
        out.push_str(&rest[..start]);
        let after = &rest[start + REMOVE_START.len()..];
        let end = after.find(REMOVE_END).ok_or_else(|| {
            GawError::Transform(format!("unterminated {} marker", REMOVE_START))
        })?;
        rest = &after[end + REMOVE_END.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Byte offset of `needle` (ASCII) in `haystack`, ignoring case.
fn find_ascii_case_insensitive(haystack: &str, needle: &str, last: bool) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if hay.len() < needle.len() {
        return None;
    }
    let mut positions = 0..=hay.len() - needle.len();
    let is_match = |&i: &usize| hay[i..i + needle.len()].eq_ignore_ascii_case(needle);
    if last {
        positions.rev().find(is_match)
    } else {
        positions.find(is_match)
    }
}

/// Configured changes per level, plus a `default` used for grid-aware
/// classifications that have no level-specific entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlChanges {
    #[serde(default)]
    pub low: Option<SnippetTransform>,
    #[serde(default)]
    pub moderate: Option<SnippetTransform>,
    #[serde(default)]
    pub high: Option<SnippetTransform>,
    #[serde(default)]
    pub default: Option<SnippetTransform>,
}

/// Transforms keyed by level.
#[derive(Default)]
pub struct TransformSet {
    by_level: HashMap<GridLevel, Box<dyn HtmlTransform>>,
    default: Option<Box<dyn HtmlTransform>>,
}

impl TransformSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_changes(changes: &HtmlChanges) -> Self {
        let mut set = Self::new();
        for (level, change) in [
            (GridLevel::Low, &changes.low),
            (GridLevel::Moderate, &changes.moderate),
            (GridLevel::High, &changes.high),
        ] {
            if let Some(change) = change {
                set = set.with_level(level, change.clone());
            }
        }
        if let Some(change) = &changes.default {
            set = set.with_default(change.clone());
        }
        set
    }

    pub fn with_level(mut self, level: GridLevel, transform: impl HtmlTransform + 'static) -> Self {
        self.by_level.insert(level, Box::new(transform));
        self
    }

    pub fn with_default(mut self, transform: impl HtmlTransform + 'static) -> Self {
        self.default = Some(Box::new(transform));
        self
    }

    pub fn for_level(&self, level: GridLevel) -> Option<&dyn HtmlTransform> {
        self.by_level.get(&level).map(|t| &**t)
    }

    /// Level-specific transform first, then `default` if the classification
    /// is grid-aware.
    pub fn select(&self, classification: &GridClassification) -> Option<&dyn HtmlTransform> {
        self.for_level(classification.level).or_else(|| {
            classification
                .is_grid_aware()
                .then(|| self.default.as_deref())
                .flatten()
        })
    }
}

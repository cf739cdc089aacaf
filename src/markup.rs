/*!
 * Inline markup handling for localization strings.
 *
 * Game strings carry color spans such as `<color=#ffa500>...</color>` that
 * must survive translation untouched. This module splits a string into plain
 * runs and tags, groups well-formed `(open, content, close)` triples so the
 * content can be translated on its own, and re-inserts stray tags into
 * translated text at length-scaled offsets.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Opening tag with any payload up to the first `>`, or the literal closing tag
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<color=[^>]+>|</color>").unwrap());

const CLOSING_TAG: &str = "</color>";

/// A piece of a segmented string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Translatable text
    Plain(String),
    /// Markup, never translated
    Tag(String),
}

impl Segment {
    /// Raw text of the segment
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Tag(text) => text,
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag(_))
    }

    pub fn is_opening_tag(&self) -> bool {
        matches!(self, Self::Tag(raw) if raw != CLOSING_TAG)
    }

    pub fn is_closing_tag(&self) -> bool {
        matches!(self, Self::Tag(raw) if raw == CLOSING_TAG)
    }
}

/// Segments grouped for translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// A well-formed span; only `content` is translated
    Paired {
        open: String,
        content: String,
        close: String,
    },
    /// Plain text outside any span
    Text(String),
    /// A tag that is not part of a well-formed span
    Loose(String),
}

/// A tag's location inside the plain-text projection of a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPosition {
    /// Offset in characters
    pub offset: usize,
    /// Raw tag text
    pub raw: String,
}

/// Split a string into plain runs and tags.
///
/// Matching is left-to-right and non-overlapping. Empty plain runs are not
/// emitted, and anything that does not match the tag grammar (for example an
/// opening tag without its `>`) stays in the plain text.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for found in TAG_REGEX.find_iter(text) {
        if found.start() > last {
            segments.push(Segment::Plain(text[last..found.start()].to_string()));
        }
        segments.push(Segment::Tag(found.as_str().to_string()));
        last = found.end();
    }

    if last < text.len() {
        segments.push(Segment::Plain(text[last..].to_string()));
    }

    segments
}

/// Concatenate segments back into a string
pub fn join(segments: &[Segment]) -> String {
    segments.iter().map(Segment::as_str).collect()
}

/// Whether the string contains anything worth sending to a backend
pub fn has_translatable_text(segments: &[Segment]) -> bool {
    segments
        .iter()
        .any(|s| matches!(s, Segment::Plain(text) if !text.trim().is_empty()))
}

/// Group segments into paired spans, plain text and loose tags.
///
/// `open, plain, close` becomes a `Paired` unit, and so does an open tag
/// directly followed by a close tag (with empty content). Nested or
/// unbalanced tags end up as `Loose`.
pub fn group_units(segments: &[Segment]) -> Vec<Unit> {
    let mut units = Vec::with_capacity(segments.len());
    let mut i = 0;

    while i < segments.len() {
        let current = &segments[i];

        if current.is_opening_tag() {
            match (segments.get(i + 1), segments.get(i + 2)) {
                (Some(Segment::Plain(content)), Some(close)) if close.is_closing_tag() => {
                    units.push(Unit::Paired {
                        open: current.as_str().to_string(),
                        content: content.clone(),
                        close: close.as_str().to_string(),
                    });
                    i += 3;
                    continue;
                }
                (Some(close), _) if close.is_closing_tag() => {
                    units.push(Unit::Paired {
                        open: current.as_str().to_string(),
                        content: String::new(),
                        close: close.as_str().to_string(),
                    });
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }

        units.push(match current {
            Segment::Plain(text) => Unit::Text(text.clone()),
            Segment::Tag(raw) => Unit::Loose(raw.clone()),
        });
        i += 1;
    }

    units
}

/// Project segments onto their plain text, remembering where each tag sat
pub fn extract_tag_positions(segments: &[Segment]) -> (String, Vec<TagPosition>) {
    let mut plain = String::new();
    let mut offset = 0;
    let mut positions = Vec::new();

    for seg in segments {
        match seg {
            Segment::Plain(text) => {
                plain.push_str(text);
                offset += text.chars().count();
            }
            Segment::Tag(raw) => positions.push(TagPosition {
                offset,
                raw: raw.clone(),
            }),
        }
    }

    (plain, positions)
}

/// Re-insert tags into translated plain text.
///
/// Each offset is scaled by `len(translated) / len(original)` (in
/// characters), rounded, and clamped to the translated length. This is a
/// proportional heuristic and does not align words. Tags sharing an offset
/// keep their original order.
pub fn reconstruct(translated: &str, positions: &[TagPosition], original_plain: &str) -> String {
    if positions.is_empty() {
        return translated.to_string();
    }

    let translated_len = translated.chars().count();
    let original_len = original_plain.chars().count();
    let ratio = if original_len == 0 {
        1.0
    } else {
        translated_len as f64 / original_len as f64
    };

    // Byte index of every char boundary, including the end
    let boundaries: Vec<usize> = translated
        .char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(translated.len()))
        .collect();

    let mut result = translated.to_string();
    for position in positions.iter().rev() {
        let scaled = (position.offset as f64 * ratio).round() as usize;
        let char_offset = scaled.min(translated_len);
        result.insert_str(boundaries[char_offset], &position.raw);
    }

    result
}

/// Split a string into leading whitespace, core text and trailing whitespace
pub fn split_whitespace_margins(text: &str) -> (&str, &str, &str) {
    let core = text.trim();
    if core.is_empty() {
        return (text, "", "");
    }

    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    (&text[..start], core, &text[end..])
}

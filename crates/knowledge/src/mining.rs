//! Step and UI-element extraction from instructional text.
//!
//! These work on raw text without any generation service, so callers can
//! preview steps or on-screen targets straight from a document. The planner
//! also uses `extract_steps` on prose-only model replies and as its heuristic
//! fallback.

use crate::types::UiElement;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

/// Accepted step length, in characters.
const MIN_STEP_CHARS: usize = 5;
const MAX_STEP_CHARS: usize = 200;

/// Longest description kept for a UI element mention.
const MAX_DESCRIPTION_GRAPHEMES: usize = 120;

/// "Step 3:" style markers (fullwidth colon allowed) and circled numerals ① to ⑳.
static STEP_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bstep\s*\d+\s*[:：]|[\x{2460}-\x{2473}]").expect("valid regex")
});

/// "1. text", "2) text" and "3、text" list lines.
static NUMBERED_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+(?:[.)][ \t]+|、[ \t]*)(\S.*)$").expect("valid regex")
});

/// A quoted label after an action verb: click "Save", select the 'Export' option.
static QUOTED_TARGET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(click|select|find|press|choose|open|tap)\s+(?:on\s+)?(?:the\s+)?["“'「]([^"”'」\n]{1,60})["”'」]"#,
    )
    .expect("valid regex")
});

/// A UI noun followed by its label: `Button: Save`, `menu：File`.
static LABELLED_NOUN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(button|menu|tab|field|icon|dialog|panel|option|link|checkbox)\s*[:：][ \t]*([^\n,;.，。；]{1,60})",
    )
    .expect("valid regex")
});

/// Extract step phrases in document order.
///
/// A marked step runs from its marker to the next marker or the end of the
/// line, whichever comes first. Numbered-list lines without a marker count
/// as steps too. Results are deduplicated on their alphanumeric content and
/// kept only when 5 to 200 characters long.
pub fn extract_steps(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    let markers: Vec<(usize, usize)> = STEP_MARKER_REGEX
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    for (i, &(_, end)) in markers.iter().enumerate() {
        let line_end = text[end..].find('\n').map_or(text.len(), |offset| end + offset);
        let next_marker = markers.get(i + 1).map_or(text.len(), |&(start, _)| start);
        let stop = line_end.min(next_marker);
        found.push((end, text[end..stop].trim().to_string()));
    }

    for caps in NUMBERED_LINE_REGEX.captures_iter(text) {
        let (Some(line), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if STEP_MARKER_REGEX.is_match(line.as_str()) {
            continue;
        }
        found.push((line.start(), body.as_str().trim().to_string()));
    }

    found.sort_by_key(|(position, _)| *position);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, step)| step)
        .filter(|step| {
            let len = step.chars().count();
            (MIN_STEP_CHARS..=MAX_STEP_CHARS).contains(&len)
        })
        .filter(|step| seen.insert(dedup_key(step)))
        .collect()
}

/// Extract UI element mentions in document order, one per distinct label.
pub fn extract_ui_elements(text: &str) -> Vec<UiElement> {
    let mut found: Vec<(usize, UiElement)> = Vec::new();

    for caps in QUOTED_TARGET_REGEX.captures_iter(text) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        found.push((
            whole.start(),
            UiElement {
                element: label.as_str().trim().to_string(),
                description: line_context(text, whole.start()),
            },
        ));
    }

    for caps in LABELLED_NOUN_REGEX.captures_iter(text) {
        let (Some(whole), Some(noun), Some(label)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        found.push((
            whole.start(),
            UiElement {
                element: label.as_str().trim().to_string(),
                description: format!(
                    "{}: {}",
                    noun.as_str().to_lowercase(),
                    line_context(text, whole.start())
                ),
            },
        ));
    }

    found.sort_by_key(|(position, _)| *position);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, element)| element)
        .filter(|element| !element.element.is_empty())
        .filter(|element| seen.insert(element.element.to_lowercase()))
        .collect()
}

/// Loose identity for step deduplication: lowercase letters and digits only.
fn dedup_key(step: &str) -> String {
    step.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The trimmed line around `position`, cut to a readable length.
fn line_context(text: &str, position: usize) -> String {
    let start = text[..position].rfind('\n').map_or(0, |i| i + 1);
    let end = text[position..]
        .find('\n')
        .map_or(text.len(), |i| position + i);
    let line = text[start..end].trim();

    let mut graphemes = line.graphemes(true);
    let head: String = graphemes.by_ref().take(MAX_DESCRIPTION_GRAPHEMES).collect();
    if graphemes.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

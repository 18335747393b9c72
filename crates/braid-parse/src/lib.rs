//! Text transforms for chat content: task-flag handling, title/note
//! extraction, fence-aware checklist addressing, and bot-message templating.
//! Everything here is pure string-in/string-out.

/// Template used for TaskBot announcements when no custom template is set.
pub const DEFAULT_BOT_TEMPLATE: &str = "Task created: \"{title}\" by {creator}";

const TASK_FLAG: &str = ":task";

/// Locate `:task` as a standalone whitespace-delimited token, case-insensitive.
/// Returns the byte span of the token itself.
fn find_task_flag(text: &str) -> Option<(usize, usize)> {
    let mut start = 0;
    let mut in_token = false;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_token {
                if text[start..i].eq_ignore_ascii_case(TASK_FLAG) {
                    return Some((start, i));
                }
                in_token = false;
            }
        } else if !in_token {
            start = i;
            in_token = true;
        }
    }
    if in_token && text[start..].eq_ignore_ascii_case(TASK_FLAG) {
        return Some((start, text.len()));
    }
    None
}

/// True iff the text contains the `:task` flag as a separate word.
/// `foo:taskbar` never triggers.
pub fn contains_task_flag(text: &str) -> bool {
    find_task_flag(text).is_some()
}

/// Remove every `:task` token, each with one adjacent whitespace character.
/// Text without the flag passes through unchanged. The result may be empty;
/// see [`message_body`] for the storage fallback.
pub fn strip_task_flag(text: &str) -> String {
    let mut out = text.to_string();
    while let Some((mut start, mut end)) = find_task_flag(&out) {
        // Swallow a single whitespace char after the token, or before it
        // when the token ends the string.
        if let Some(ch) = out[end..].chars().next() {
            if ch.is_whitespace() {
                end += ch.len_utf8();
            }
        } else if let Some(ch) = out[..start].chars().next_back() {
            if ch.is_whitespace() {
                start -= ch.len_utf8();
            }
        }
        out.replace_range(start..end, "");
    }
    out
}

/// The content stored for a posted message: the flag-stripped text, unless
/// stripping leaves nothing, in which case the original text is kept (an
/// empty message is never stored).
pub fn message_body(text: &str) -> String {
    let stripped = strip_task_flag(text);
    if stripped.trim().is_empty() {
        text.to_string()
    } else {
        stripped
    }
}

/// Split content into a task title and note. The first non-blank line
/// (trimmed) is the title; the remainder, minus leading blank lines and
/// trailing whitespace, is the note. All-blank content yields `None` and the
/// caller must skip task creation.
pub fn extract_title_note(text: &str) -> Option<(String, String)> {
    let normalized = text.replace("\r\n", "\n");
    let trimmed = normalized.trim_end();

    let lines: Vec<&str> = trimmed.split('\n').collect();
    let title_idx = lines.iter().position(|l| !l.trim().is_empty())?;
    let title = lines[title_idx].trim().to_string();

    let mut note_lines = &lines[title_idx + 1..];
    while let Some((first, rest)) = note_lines.split_first() {
        if first.trim().is_empty() {
            note_lines = rest;
        } else {
            break;
        }
    }
    let note = note_lines.join("\n").trim_end().to_string();

    Some((title, note))
}

/// A checklist line addressable by ordinal. Ordinals count document-order
/// occurrences outside fenced code blocks only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub ordinal: usize,
    pub checked: bool,
    pub label: String,
}

/// Matches `- [ ] label` / `- [x] label` / `- [X] label` at the start of a
/// line. Returns (checked, label).
fn checklist_line(line: &str) -> Option<(bool, &str)> {
    let rest = line.strip_prefix("- [")?;
    let mut chars = rest.chars();
    let checked = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let label = chars.as_str().strip_prefix("] ")?;
    Some((checked, label))
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// List the addressable checklist items in document order, skipping anything
/// inside triple-backtick fences.
pub fn checklist_items(text: &str) -> Vec<ChecklistItem> {
    let mut items = Vec::new();
    let mut in_fence = false;
    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((checked, label)) = checklist_line(line) {
            items.push(ChecklistItem {
                ordinal: items.len(),
                checked,
                label: label.to_string(),
            });
        }
    }
    items
}

/// Rewrite the checklist line at `ordinal` to the requested checked state.
/// Every other line, fenced content included, passes through verbatim. A
/// missing ordinal returns the input unchanged; callers treat output equal to
/// input as a not-found condition.
pub fn toggle_checklist(text: &str, ordinal: usize, checked: bool) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut seen = 0;

    for raw in text.split('\n') {
        let (line, cr) = match raw.strip_suffix('\r') {
            Some(l) => (l, "\r"),
            None => (raw, ""),
        };

        if is_fence(line) {
            in_fence = !in_fence;
            out.push(raw.to_string());
            continue;
        }

        if !in_fence {
            if let Some((_, label)) = checklist_line(line) {
                if seen == ordinal {
                    let mark = if checked { 'x' } else { ' ' };
                    out.push(format!("- [{mark}] {label}{cr}"));
                    seen += 1;
                    continue;
                }
                seen += 1;
            }
        }

        out.push(raw.to_string());
    }

    out.join("\n")
}

/// Substitute `{title}` and `{creator}` into the announcement template.
/// A blank or absent template falls back to [`DEFAULT_BOT_TEMPLATE`].
pub fn render_bot_message(template: Option<&str>, title: &str, creator: &str) -> String {
    let template = match template {
        Some(t) if !t.trim().is_empty() => t,
        _ => DEFAULT_BOT_TEMPLATE,
    };
    template.replace("{title}", title).replace("{creator}", creator)
}

//! Preparing LLM replies for synthesis
//!
//! Replies arrive as markdown. Emphasis markers, headings, code fences and
//! link targets read badly aloud, so they are stripped before synthesis, and
//! long replies are split on sentence boundaries to respect the service's
//! per-request input limit.

/// Strip markdown and symbols that a voice would otherwise read literally
pub fn normalize_text_for_tts(text: &str) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || line.is_empty() {
            continue;
        }

        let line = line.trim_start_matches('#').trim_start();
        let line = strip_list_marker(line);
        let line = strip_links(line);
        lines.push(line);
    }

    let mut result = lines.join(" ");
    for marker in ["**", "__", "`", "~~"] {
        result = result.replace(marker, "");
    }
    result = result.replace(" & ", " and ");
    result = result.replace(['*', '|'], " ");

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_list_marker(line: &str) -> &str {
    for bullet in ["- ", "* ", "+ ", "> "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest;
        }
    }

    // "1. item" / "12) item"
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest;
        }
    }
    line
}

/// `[label](url)` becomes `label`
fn strip_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find("](").map(|i| open + i) else {
            break;
        };
        let Some(end) = rest[close..].find(')').map(|i| close + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&rest[open + 1..close]);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Split `text` into chunks of at most `max_bytes` bytes.
///
/// Breaks prefer sentence ends, then whitespace; a single word longer than the
/// limit is cut on a character boundary.
pub fn split_for_synthesis(text: &str, max_bytes: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let max_bytes = max_bytes.max(4);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        if current.len() + sentence.len() + 1 <= max_bytes {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if sentence.len() <= max_bytes {
            current.push_str(sentence);
        } else {
            for word in sentence.split_whitespace() {
                if current.len() + word.len() + 1 > max_bytes && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                if word.len() > max_bytes {
                    let mut start = 0;
                    while start < word.len() {
                        let mut end = (start + max_bytes).min(word.len());
                        while !word.is_char_boundary(end) {
                            end -= 1;
                        }
                        chunks.push(word[start..end].to_string());
                        start = end;
                    }
                } else {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                }
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let next = i + c.len_utf8();
            if next == bytes.len() || bytes[next].is_ascii_whitespace() {
                let sentence = text[start..next].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = next;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

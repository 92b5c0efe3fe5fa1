//! YAML front-matter splitting.
//!
//! Block offsets are relative to the body, so the front matter is split off
//! before extraction and glued back on, byte for byte, when the derived
//! document is written. It is never parsed or re-serialised.

/// Split `content` into `(front_matter, body)`.
///
/// The front matter, when present, includes both `---` delimiter lines and
/// the newline after the closing one.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = strip_delimiter_line(content) else {
        return (None, content);
    };

    let mut offset = content.len() - rest.len();
    for line in rest.split_inclusive('\n') {
        if !line.ends_with('\n') {
            // Closing delimiter must be followed by a newline.
            break;
        }
        if line.trim_end() == "---" {
            let end = offset + line.len();
            return (Some(&content[..end]), &content[end..]);
        }
        offset += line.len();
    }
    (None, content)
}

/// If the first line is a `---` delimiter, return what follows it.
fn strip_delimiter_line(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let nl = rest.find('\n')?;
    if rest[..nl].trim().is_empty() {
        Some(&rest[nl + 1..])
    } else {
        None
    }
}

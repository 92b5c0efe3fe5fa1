//! Block extraction: find fenced Mermaid blocks and their exact byte spans.
//!
//! ## Why a line scanner instead of one regex?
//!
//! A single `` ```mermaid(.*?)``` `` regex happily matches a Mermaid example
//! quoted inside a ```` ````markdown ```` fence, and cannot tell a closing
//! fence from a longer or shorter backtick run. Walking the body line by
//! line with a tiny fence state machine gets both right and still yields
//! byte offsets directly, which is all the replacement pass needs.
//!
//! Recognised opener: up to three spaces, three or more backticks, the info
//! string `mermaid`, optionally `:alt text`. The closing fence is a run of at
//! least as many backticks with nothing but whitespace after it.

use crate::output::DiagramBlock;

#[derive(Debug)]
enum FenceState {
    Outside,
    Mermaid {
        start: usize,
        content_start: usize,
        fence_len: usize,
        alt: Option<String>,
    },
    Other {
        fence_char: char,
        fence_len: usize,
    },
}

struct Fence<'a> {
    fence_char: char,
    len: usize,
    info: &'a str,
}

/// Parse an opening fence line (without its line terminator).
fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let fence_char = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.len() - rest.trim_start_matches(fence_char).len();
    if len < 3 {
        return None;
    }
    Some(Fence {
        fence_char,
        len,
        info: rest[len..].trim(),
    })
}

/// Length of a closing fence run, with the indent that precedes it.
fn closing_fence(line: &str, fence_char: char, min_len: usize) -> Option<(usize, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let len = rest.len() - rest.trim_start_matches(fence_char).len();
    if len >= min_len && rest[len..].trim().is_empty() {
        Some((indent, len))
    } else {
        None
    }
}

/// `mermaid` or `mermaid:alt` info string → `Some(alt)`.
fn mermaid_info(info: &str) -> Option<Option<String>> {
    if info == "mermaid" {
        return Some(None);
    }
    let alt = info.strip_prefix("mermaid:")?.trim();
    Some((!alt.is_empty()).then(|| alt.to_string()))
}

/// Return every Mermaid block in `body`, in document order.
///
/// Pure and deterministic. An unclosed block yields nothing.
pub fn extract_blocks(body: &str) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut state = FenceState::Outside;
    let mut pos = 0;

    for raw in body.split_inclusive('\n') {
        let line_start = pos;
        pos += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);

        state = match state {
            FenceState::Outside => match parse_fence(line) {
                Some(f) if f.fence_char == '`' => match mermaid_info(f.info) {
                    Some(alt) => FenceState::Mermaid {
                        start: line_start,
                        content_start: pos,
                        fence_len: f.len,
                        alt,
                    },
                    None => FenceState::Other {
                        fence_char: '`',
                        fence_len: f.len,
                    },
                },
                Some(f) => FenceState::Other {
                    fence_char: f.fence_char,
                    fence_len: f.len,
                },
                None => FenceState::Outside,
            },
            FenceState::Mermaid {
                start,
                content_start,
                fence_len,
                alt,
            } => match closing_fence(line, '`', fence_len) {
                Some((indent, len)) => {
                    blocks.push(DiagramBlock {
                        index: blocks.len(),
                        source_code: body[content_start..line_start].trim().to_string(),
                        alt_text: alt,
                        start_offset: start,
                        end_offset: line_start + indent + len,
                    });
                    FenceState::Outside
                }
                None => FenceState::Mermaid {
                    start,
                    content_start,
                    fence_len,
                    alt,
                },
            },
            FenceState::Other {
                fence_char,
                fence_len,
            } => match closing_fence(line, fence_char, fence_len) {
                Some(_) => FenceState::Outside,
                None => FenceState::Other {
                    fence_char,
                    fence_len,
                },
            },
        };
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(body: &str, blocks: &[DiagramBlock]) -> String {
        let mut out = String::new();
        let mut cursor = 0;
        for b in blocks {
            out.push_str(&body[cursor..b.start_offset]);
            out.push_str(b.full_match(body));
            cursor = b.end_offset;
        }
        out.push_str(&body[cursor..]);
        out
    }

    #[test]
    fn single_block_offsets() {
        let body = "```mermaid\ngraph TD\nA-->B\n```";
        let blocks = extract_blocks(body);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].source_code, "graph TD\nA-->B");
        assert_eq!(blocks[0].start_offset, 0);
        assert_eq!(blocks[0].end_offset, body.len());
        assert_eq!(blocks[0].alt_text, None);
    }

    #[test]
    fn end_offset_excludes_trailing_newline() {
        let body = "a\n```mermaid\npie\n```\nb\n";
        let b = &extract_blocks(body)[0];
        assert_eq!(b.full_match(body), "```mermaid\npie\n```");
        assert_eq!(&body[b.end_offset..], "\nb\n");
    }

    #[test]
    fn alt_text_is_trimmed_and_empty_is_none() {
        let body = "```mermaid: Login flow \nA\n```\n```mermaid:\nB\n```\n";
        let blocks = extract_blocks(body);
        assert_eq!(blocks[0].alt_text.as_deref(), Some("Login flow"));
        assert_eq!(blocks[1].alt_text, None);
    }

    #[test]
    fn several_blocks_are_ordered_and_disjoint() {
        let body = "# T\n```mermaid\nA\n```\ntext\n```mermaid\nB\n```\n\n```mermaid\nC\n```\n";
        let blocks = extract_blocks(body);
        assert_eq!(blocks.len(), 3);
        for (i, pair) in blocks.windows(2).enumerate() {
            assert_eq!(pair[0].index, i);
            assert!(pair[0].end_offset <= pair[1].start_offset);
        }
        assert_eq!(reconstruct(body, &blocks), body);
    }

    #[test]
    fn blocks_inside_other_fences_are_ignored() {
        let body = "````markdown\n```mermaid\nA\n```\n````\n~~~\n```mermaid\nB\n```\n~~~\n```mermaid\nC\n```\n";
        let blocks = extract_blocks(body);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source_code, "C");
    }

    #[test]
    fn longer_opener_needs_longer_closer() {
        let body = "````mermaid\nA\n```\nstill inside\n````\n";
        let blocks = extract_blocks(body);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source_code, "A\n```\nstill inside");
    }

    #[test]
    fn unclosed_block_yields_nothing() {
        assert!(extract_blocks("```mermaid\ngraph TD\n").is_empty());
    }

    #[test]
    fn no_blocks_is_empty() {
        assert!(extract_blocks("plain text\n```rust\nfn main() {}\n```\n").is_empty());
        assert!(extract_blocks("").is_empty());
    }

    #[test]
    fn crlf_lines() {
        let body = "```mermaid\r\ngraph LR\r\n```\r\n";
        let b = &extract_blocks(body)[0];
        assert_eq!(b.source_code, "graph LR");
        assert_eq!(b.full_match(body), "```mermaid\r\ngraph LR\r\n```");
    }
}

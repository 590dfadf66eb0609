//! Paragraph-boundary text splitter.
//!
//! Splits one page of extracted text into pieces of at most `max_chars`
//! bytes. Splitting happens on paragraph boundaries (`\n\n`) when possible
//! so that each piece stays coherent.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries.
//! 2. Accumulate paragraphs into a buffer until adding the next one would
//!    exceed `max_chars`, then flush the buffer as a piece.
//! 3. A single paragraph longer than `max_chars` is hard-split at the last
//!    newline or space before the limit (or at the limit itself).
//! 4. Blank text yields no pieces.
//!
//! # Example
//!
//! ```rust
//! use dsmate::chunk::split_text;
//!
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", 4000);
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

/// Split text into pieces on paragraph boundaries, respecting `max_chars`.
///
/// `max_chars` must be greater than zero.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            pieces.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut pieces);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        pieces.push(current_buf);
    }

    pieces
}

fn hard_split(paragraph: &str, max_chars: usize, pieces: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let limit = snap_to_char_boundary(remaining, remaining.len().min(max_chars));
        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        // A single multi-byte char wider than max_chars still has to move forward.
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len())
        } else {
            split_at
        };
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_piece() {
        let pieces = split_text("Hello, world!", 4000);
        assert_eq!(pieces, vec!["Hello, world!"]);
    }

    #[test]
    fn test_blank_text_has_no_pieces() {
        assert!(split_text("", 4000).is_empty());
        assert!(split_text("  \n\n \n\n", 4000).is_empty());
    }

    #[test]
    fn test_paragraphs_grouped_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let pieces = split_text(text, 4000);
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].contains("First paragraph."));
        assert!(pieces[0].contains("Third paragraph."));
    }

    #[test]
    fn test_paragraphs_flushed_over_limit() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let pieces = split_text(text, 30);
        assert_eq!(
            pieces,
            vec![
                "This is paragraph one.",
                "This is paragraph two.",
                "This is paragraph three."
            ]
        );
    }

    #[test]
    fn test_long_paragraph_hard_split_at_spaces() {
        let text = "alpha beta gamma delta epsilon";
        let pieces = split_text(text, 12);
        for p in &pieces {
            assert!(p.len() <= 12, "piece too long: {:?}", p);
        }
        assert_eq!(pieces.join(" "), text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let pieces = split_text(text, 3);
        assert!(!pieces.is_empty());
        for p in &pieces {
            assert!(!p.is_empty());
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(split_text(text, 12), split_text(text, 12));
    }
}

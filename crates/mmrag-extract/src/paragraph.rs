//! Paragraph splitting.

/// Split text into trimmed, non-empty paragraphs.
///
/// A paragraph boundary is any run of blank lines (empty or whitespace
/// only). Line breaks inside a paragraph are kept; paragraphs are never
/// split further. Windows line endings are normalized first.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut paragraphs);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut paragraphs);

    paragraphs
}

fn flush(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let paragraph = lines.join("\n").trim().to_string();
    if !paragraph.is_empty() {
        out.push(paragraph);
    }
    lines.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_paragraphs() {
        let text = "Machine learning is a field.\n\nCooking pasta requires water.";
        assert_eq!(
            split_paragraphs(text),
            vec!["Machine learning is a field.", "Cooking pasta requires water."]
        );
    }

    #[test]
    fn test_blank_runs_and_padding() {
        let text = "\n\n  first  \n\n\n\nsecond\n\n";
        assert_eq!(split_paragraphs(text), vec!["first", "second"]);
    }

    #[test]
    fn test_whitespace_only_line_is_boundary() {
        let text = "alpha\n   \t\nbeta";
        assert_eq!(split_paragraphs(text), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_single_newlines_stay_inside_paragraph() {
        let text = "line one\nline two\n\nnext";
        assert_eq!(split_paragraphs(text), vec!["line one\nline two", "next"]);
    }

    #[test]
    fn test_crlf() {
        let text = "one\r\n\r\ntwo\r\nthree";
        assert_eq!(split_paragraphs(text), vec!["one", "two\nthree"]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs(" \n\n \t ").is_empty());
    }

    #[test]
    fn test_long_paragraph_not_split() {
        let long = "word ".repeat(5000);
        let out = split_paragraphs(&long);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], long.trim());
    }
}

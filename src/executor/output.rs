//! Output post-processing for error messages.

const MAX_LINE_CHARS: usize = 200;
const MAX_TOTAL_CHARS: usize = 1000;

/// Shorten command output so it can be embedded in an error message.
///
/// Keeps at most `max_lines` lines, cuts long lines at a character boundary
/// and caps the overall length.
pub fn sanitize_output(output: &str, max_lines: usize) -> String {
    let mut result = String::new();
    let mut total_chars = 0;

    for line in output.lines().take(max_lines) {
        let line = match line.char_indices().nth(MAX_LINE_CHARS) {
            Some((cut, _)) => format!("{}...", &line[..cut]),
            None => line.to_string(),
        };

        let line_chars = line.chars().count();
        if total_chars + line_chars > MAX_TOTAL_CHARS {
            result.push_str("...[truncated]");
            return result;
        }

        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&line);
        total_chars += line_chars;
    }

    if output.lines().count() > max_lines {
        result.push_str("\n...[additional output truncated]");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_output_unchanged() {
        assert_eq!(sanitize_output("E: Unable to locate\npackage", 10), "E: Unable to locate\npackage");
    }

    #[test]
    fn test_line_limit() {
        let output = "Line 1\nLine 2\nLine 3\nLine 4";
        let sanitized = sanitize_output(output, 2);
        assert!(sanitized.contains("Line 2"));
        assert!(!sanitized.contains("Line 3"));
        assert!(sanitized.ends_with("[additional output truncated]"));
    }

    #[test]
    fn test_long_line_cut_on_char_boundary() {
        let long_line = "é".repeat(300);
        let sanitized = sanitize_output(&long_line, 10);
        assert!(sanitized.ends_with("..."));
        assert_eq!(sanitized.chars().count(), MAX_LINE_CHARS + 3);
    }

    #[test]
    fn test_total_length_capped() {
        let output = vec!["x".repeat(150); 20].join("\n");
        let sanitized = sanitize_output(&output, 20);
        assert!(sanitized.contains("...[truncated]"));
        assert!(sanitized.len() < 1100);
    }
}

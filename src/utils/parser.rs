//! Text extraction primitives for scraping unstructured command output.

use regex::RegexBuilder;

/// Find the first `<label>: <value>` occurrence (label matched
/// case-insensitively, anywhere on a line) and return the trimmed value.
///
/// The label must be followed by a colon and a space. Empty values are
/// skipped.
pub fn labeled_value(content: &str, label: &str) -> Option<String> {
    let pattern = format!(r"{}: (.*)", regex::escape(label));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()?;

    let value = re
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|value| !value.is_empty())
        .map(str::to_string);
    value
}

/// Count non-empty lines.
pub fn count_lines(content: &str) -> usize {
    content.lines().filter(|line| !line.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_value_is_case_insensitive_and_trimmed() {
        let text = "Outputs:\n    PERMALINK:   https://example.com/a/1  \r\nDone";
        assert_eq!(
            labeled_value(text, "Permalink"),
            Some("https://example.com/a/1".to_string())
        );
    }

    #[test]
    fn labeled_value_takes_first_occurrence() {
        let text = "Permalink: https://first\nPermalink: https://second\n";
        assert_eq!(labeled_value(text, "Permalink"), Some("https://first".to_string()));
    }

    #[test]
    fn labeled_value_does_not_cross_lines() {
        assert_eq!(labeled_value("Permalink:\nhttps://next-line", "Permalink"), None);
    }

    #[test]
    fn labeled_value_requires_space_after_colon() {
        assert_eq!(labeled_value("Permalink:https://example.com/a/1", "Permalink"), None);
    }

    #[test]
    fn labeled_value_skips_empty_occurrences() {
        let text = "Permalink: \nPermalink: https://second\n";
        assert_eq!(labeled_value(text, "Permalink"), Some("https://second".to_string()));
    }

    #[test]
    fn count_lines_skips_blank() {
        assert_eq!(count_lines("a\n\n b \n"), 2);
    }
}

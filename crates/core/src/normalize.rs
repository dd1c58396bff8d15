/// Canonicalize free text for matching: lowercase, underscores and hyphens
/// become spaces, whitespace runs collapse to a single space, ends trimmed.
///
/// Applied to queries and metric names so substring containment works across
/// `Gross_Margin` / `gross-margin` spellings. Stored documents keep their
/// casing and are never passed through this.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = true;
    for ch in text.chars() {
        let ch = match ch {
            '_' | '-' => ' ',
            other => other,
        };
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            prev_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_become_spaces() {
        assert_eq!(normalize_text("Gross_Margin"), "gross margin");
        assert_eq!(normalize_text("gross-margin"), "gross margin");
        assert_eq!(normalize_text("Gross_Margin"), normalize_text("gross-margin"));
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(normalize_text("  How   was\tQ2\nrevenue  "), "how was q2 revenue");
    }

    #[test]
    fn output_has_no_separators_or_doubled_spaces() {
        for input in ["A__B--C", "  _ - _  ", "MiXeD_case-Text  here"] {
            let normalized = normalize_text(input);
            assert!(!normalized.contains('_'));
            assert!(!normalized.contains('-'));
            assert!(!normalized.contains("  "));
            assert_eq!(normalized, normalized.to_lowercase());
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("_-_"), "");
    }
}

/// Sanitize extracted text before it is embedded in prompts.
/// Strips control characters (keeping newlines and tabs), trims trailing
/// whitespace per line and collapses runs of blank lines to one.
pub fn sanitize_extracted_text(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    let mut out: Vec<&str> = Vec::new();
    for line in filtered.lines().map(str::trim_end) {
        if line.is_empty() && out.last().map_or(true, |prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_bytes() {
        let raw = "Operator: Jane\x00Doe";
        let clean = sanitize_extracted_text(raw);
        assert!(!clean.contains('\x00'));
        assert_eq!(clean, "Operator: JaneDoe");
    }

    #[test]
    fn strips_control_characters() {
        let raw = "Step 1\x01\x02\x03\r\nStep 2";
        assert_eq!(sanitize_extracted_text(raw), "Step 1\nStep 2");
    }

    #[test]
    fn collapses_blank_lines() {
        let raw = "\n\nSection A\n\n\n\nSection B\n\n\n";
        assert_eq!(sanitize_extracted_text(raw), "Section A\n\nSection B");
    }

    #[test]
    fn keeps_indentation_trims_trailing() {
        let raw = "1. Scope   \n\t1.1 Purpose  ";
        assert_eq!(sanitize_extracted_text(raw), "1. Scope\n\t1.1 Purpose");
    }

    #[test]
    fn preserves_punctuation_and_accents() {
        let raw = "Temp: 2\u{2013}8 °C | Réf. «SOP-12» \u{2014} 15,50€";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_extracted_text(""), "");
        assert_eq!(sanitize_extracted_text("\x00\x01\x02"), "");
        assert_eq!(sanitize_extracted_text(" \n \n"), "");
    }
}
